//! Embedding index: chunks, their normalized vectors, and persistence.
//!
//! A build produces a complete [`IndexSnapshot`] off to the side and then
//! swaps it in under a short write lock. Readers clone the `Arc` and keep
//! querying whatever snapshot they started with, so nobody observes a
//! half-built index.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::embedding::{Embedder, normalize_l2};
use crate::error::{IndexError, Result};
use crate::store::FlatIpStore;

const METADATA_VERSION: u32 = 1;
const VECTORS_EXT: &str = ".vectors";
const METADATA_EXT: &str = ".meta.json";

/// Immutable vectors plus the chunks they were computed from.
/// Row `i` of the store belongs to `chunks[i]`.
#[derive(Debug)]
pub struct IndexSnapshot {
    store: FlatIpStore,
    chunks: Vec<Chunk>,
    model_id: String,
}

impl IndexSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn chunk(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    #[must_use]
    pub fn store(&self) -> &FlatIpStore {
        &self.store
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub chunks: usize,
    pub dimension: usize,
    pub duration_ms: u64,
}

/// The stored model identifier differs from the current embedder's.
/// Advisory only: the index still loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMismatchWarning {
    pub stored: String,
    pub current: String,
}

impl std::fmt::Display for ModelMismatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index was built with model '{}', current model is '{}'",
            self.stored, self.current
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub chunks: usize,
    pub model_id: String,
    pub warning: Option<ModelMismatchWarning>,
}

/// Paths written by [`CodeIndex::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexArtifacts {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl IndexArtifacts {
    /// `<prefix>.vectors` and `<prefix>.meta.json`.
    #[must_use]
    pub fn for_prefix(prefix: &Path) -> Self {
        Self {
            vectors: with_suffix(prefix, VECTORS_EXT),
            metadata: with_suffix(prefix, METADATA_EXT),
        }
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(prefix.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Side-car written next to the vector file.
#[derive(Debug, Serialize, Deserialize)]
struct IndexMetadata {
    format_version: u32,
    model_id: String,
    dimension: usize,
    chunk_count: usize,
    /// blake3 of the vector file.
    vectors_checksum: String,
    chunks: Vec<Chunk>,
}

/// Queryable embedding index over code chunks.
pub struct CodeIndex<E: Embedder + ?Sized> {
    embedder: Arc<E>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl<E: Embedder + ?Sized> CodeIndex<E> {
    #[must_use]
    pub fn new(embedder: Arc<E>) -> Self {
        Self {
            embedder,
            snapshot: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    /// Embed every chunk and replace the current snapshot.
    ///
    /// An empty chunk list builds a valid, empty index.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the embedder returns vectors
    /// of the wrong dimension. The previous snapshot stays in place.
    pub fn build(&self, chunks: Vec<Chunk>) -> Result<BuildStats> {
        let start = Instant::now();
        let dimension = self.embedder.dimension();

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        let mut store = FlatIpStore::with_capacity(dimension, chunks.len());
        for mut vector in vectors {
            normalize_l2(&mut vector);
            store.push(&vector)?;
        }
        if store.len() != chunks.len() {
            return Err(IndexError::Other(format!(
                "embedder returned {} vectors for {} chunks",
                store.len(),
                chunks.len()
            )));
        }

        let snapshot = IndexSnapshot {
            store,
            chunks,
            model_id: self.embedder.model_id().to_string(),
        };
        let stats = BuildStats {
            chunks: snapshot.len(),
            dimension,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        self.swap(snapshot)?;

        tracing::info!(
            chunks = stats.chunks,
            dimension,
            duration_ms = stats.duration_ms,
            "index built"
        );
        Ok(stats)
    }

    fn swap(&self, snapshot: IndexSnapshot) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|e| IndexError::Other(format!("index lock poisoned: {e}")))?;
        *guard = Some(Arc::new(snapshot));
        Ok(())
    }

    /// The current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotBuilt`] before the first build or load.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        let guard = self
            .snapshot
            .read()
            .map_err(|e| IndexError::Other(format!("index lock poisoned: {e}")))?;
        guard.clone().ok_or(IndexError::IndexNotBuilt)
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.snapshot.read().is_ok_and(|g| g.is_some())
    }

    /// Embed and normalize query text with the index's embedder.
    ///
    /// # Errors
    ///
    /// Propagates embedder failures.
    pub fn encode_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = self.embedder.embed(text)?;
        normalize_l2(&mut vector);
        Ok(vector)
    }

    /// Write `<prefix>.vectors` and `<prefix>.meta.json`.
    ///
    /// Each file is written to a temporary sibling and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotBuilt`] if there is nothing to save and
    /// [`IndexError::Serialization`] on encoding or I/O failure.
    pub async fn save(&self, prefix: &Path) -> Result<IndexArtifacts> {
        let snapshot = self.snapshot()?;
        let artifacts = IndexArtifacts::for_prefix(prefix);

        let vectors = snapshot.store.encode()?;
        let metadata = IndexMetadata {
            format_version: METADATA_VERSION,
            model_id: snapshot.model_id.clone(),
            dimension: snapshot.store.dimension(),
            chunk_count: snapshot.len(),
            vectors_checksum: blake3::hash(&vectors).to_hex().to_string(),
            chunks: snapshot.chunks.clone(),
        };
        let metadata = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| IndexError::Serialization(format!("encode metadata: {e}")))?;

        if let Some(parent) = prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        write_atomic(&artifacts.vectors, &vectors).await?;
        write_atomic(&artifacts.metadata, &metadata).await?;

        tracing::info!(
            path = %prefix.display(),
            chunks = snapshot.len(),
            model = %snapshot.model_id,
            "index saved"
        );
        Ok(artifacts)
    }

    /// Restore an index written by [`CodeIndex::save`] and make it current.
    ///
    /// A different stored model identifier is reported through
    /// [`LoadReport::warning`] and logged; the load still succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialization`] on I/O failure, unknown format,
    /// checksum mismatch or inconsistent counts, and
    /// [`IndexError::DimensionMismatch`] if the stored vectors cannot be
    /// compared with the current embedder's output.
    pub async fn load(&self, prefix: &Path) -> Result<LoadReport> {
        let artifacts = IndexArtifacts::for_prefix(prefix);
        let metadata_bytes = tokio::fs::read(&artifacts.metadata)
            .await
            .map_err(|e| io_error(&artifacts.metadata, &e))?;
        let vectors = tokio::fs::read(&artifacts.vectors)
            .await
            .map_err(|e| io_error(&artifacts.vectors, &e))?;

        let metadata: IndexMetadata = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| IndexError::Serialization(format!("decode metadata: {e}")))?;
        if metadata.format_version != METADATA_VERSION {
            return Err(IndexError::Serialization(format!(
                "unsupported metadata version {}",
                metadata.format_version
            )));
        }

        let checksum = blake3::hash(&vectors).to_hex().to_string();
        if checksum != metadata.vectors_checksum {
            return Err(IndexError::Serialization(
                "vector file checksum does not match metadata".into(),
            ));
        }

        let store = FlatIpStore::decode(&vectors)?;
        if store.len() != metadata.chunk_count
            || metadata.chunks.len() != metadata.chunk_count
            || store.dimension() != metadata.dimension
        {
            return Err(IndexError::Serialization(format!(
                "inconsistent index: {} vectors, {} chunks, header says {}",
                store.len(),
                metadata.chunks.len(),
                metadata.chunk_count
            )));
        }

        let current_dimension = self.embedder.dimension();
        if store.dimension() != current_dimension {
            return Err(IndexError::DimensionMismatch {
                expected: current_dimension,
                actual: store.dimension(),
            });
        }

        let current_model = self.embedder.model_id();
        let warning = (metadata.model_id != current_model).then(|| ModelMismatchWarning {
            stored: metadata.model_id.clone(),
            current: current_model.to_string(),
        });
        if let Some(w) = &warning {
            tracing::warn!(stored = %w.stored, current = %w.current, "model mismatch on load");
        }

        let report = LoadReport {
            chunks: metadata.chunk_count,
            model_id: metadata.model_id.clone(),
            warning,
        };
        self.swap(IndexSnapshot {
            store,
            chunks: metadata.chunks,
            model_id: metadata.model_id,
        })?;

        tracing::info!(path = %prefix.display(), chunks = report.chunks, "index loaded");
        Ok(report)
    }
}

impl<E: Embedder + ?Sized> std::fmt::Debug for CodeIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIndex")
            .field("model_id", &self.embedder.model_id())
            .field("built", &self.is_built())
            .finish_non_exhaustive()
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = with_suffix(path, ".tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_error(&tmp, &e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, &e))
}

fn io_error(path: &Path, e: &std::io::Error) -> IndexError {
    IndexError::Serialization(format!("{}: {e}", path.display()))
}
