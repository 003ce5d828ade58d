//! Semantic code retrieval and documentation context assembly.

use std::fmt::Write;
use std::str::FromStr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chunker::{Chunk, ChunkKind};
use crate::embedding::Embedder;
use crate::error::{IndexError, Result};
use crate::index::{CodeIndex, IndexSnapshot};
use crate::languages::Lang;
use crate::store::ScoredRow;

/// Retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a chunk to enter documentation context.
    pub relevance_threshold: f32,
    /// Results fetched for documentation context.
    pub context_top_k: usize,
    /// Characters of target code placed in the synthetic query.
    pub query_prefix_chars: usize,
    /// Characters of each chunk placed in the context.
    pub snippet_chars: usize,
    /// Upper bound on the assembled context length in characters.
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.3,
            context_top_k: 3,
            query_prefix_chars: 200,
            snippet_chars: 300,
            max_context_chars: 4000,
        }
    }
}

/// A ranked hit. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
    pub rank: usize,
}

/// Kind of code a documentation request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Function,
    Class,
    File,
}

impl TargetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::File => "file",
        }
    }
}

impl From<ChunkKind> for TargetType {
    fn from(kind: ChunkKind) -> Self {
        match kind {
            ChunkKind::Function => Self::Function,
            ChunkKind::Class => Self::Class,
            ChunkKind::File => Self::File,
        }
    }
}

impl FromStr for TargetType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "function" | "fn" | "method" => Ok(Self::Function),
            "class" | "struct" | "type" => Ok(Self::Class),
            "file" | "module" => Ok(Self::File),
            other => Err(IndexError::Other(format!("unknown target type: {other}"))),
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only query front end over a [`CodeIndex`].
///
/// Every call works against the snapshot current at the time of the call,
/// so concurrent callers need no coordination with each other or with a
/// rebuild.
pub struct CodeRetriever<E: Embedder + ?Sized> {
    index: Arc<CodeIndex<E>>,
    config: RetrievalConfig,
}

impl<E: Embedder + ?Sized> CodeRetriever<E> {
    #[must_use]
    pub fn new(index: Arc<CodeIndex<E>>, config: RetrievalConfig) -> Self {
        Self { index, config }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Top-`k` chunks by cosine similarity to `query`.
    ///
    /// Returns fewer than `k` results when the corpus is smaller and an
    /// empty list for an empty corpus.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotBuilt`] before the first build or load.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let snapshot = self.index.snapshot()?;
        let vector = self.index.encode_query(query)?;
        let rows = snapshot.store().top_k(&vector, k)?;
        Ok(collect_results(&snapshot, &rows))
    }

    /// [`CodeRetriever::search`] restricted to chunks of one language.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotBuilt`] before the first build or load.
    pub fn search_filtered(
        &self,
        query: &str,
        k: usize,
        language: Lang,
    ) -> Result<Vec<SearchResult>> {
        let snapshot = self.index.snapshot()?;
        let vector = self.index.encode_query(query)?;
        let rows = snapshot.store().top_k_where(&vector, k, |row| {
            snapshot
                .chunk(row)
                .is_some_and(|c| c.language() == language)
        })?;
        Ok(collect_results(&snapshot, &rows))
    }

    /// [`CodeRetriever::search`] that aborts when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the token fires before the scan
    /// completes, and [`IndexError::IndexNotBuilt`] before the first build.
    pub fn search_cancellable(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let snapshot = self.index.snapshot()?;
        let vector = self.index.encode_query(query)?;
        let rows = snapshot
            .store()
            .top_k_cancellable(&vector, k, |_| true, cancel)?;
        Ok(collect_results(&snapshot, &rows))
    }

    /// Related-code context for documenting `target_code`.
    ///
    /// Builds a synthetic query from `target` and a prefix of the code,
    /// keeps the top results scoring at least the relevance threshold and
    /// renders each as an annotated, truncated snippet. An empty string
    /// means nothing relevant was found.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotBuilt`] before the first build or load.
    pub fn context_for_documentation(
        &self,
        target_code: &str,
        target: TargetType,
    ) -> Result<String> {
        let query = documentation_query(target_code, target, self.config.query_prefix_chars);
        let results = self.search(&query, self.config.context_top_k)?;

        let mut out = String::new();
        let mut used = 0usize;
        let mut kept = 0usize;
        for result in results
            .iter()
            .filter(|r| r.score >= self.config.relevance_threshold)
        {
            let entry = context_entry(result, self.config.snippet_chars);
            let separator = if out.is_empty() { 0 } else { 2 };
            let cost = entry.chars().count() + separator;
            if used + cost > self.config.max_context_chars {
                break;
            }
            if separator > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&entry);
            used += cost;
            kept += 1;
        }

        tracing::debug!(
            target_type = %target,
            candidates = results.len(),
            kept,
            chars = used,
            "documentation context assembled"
        );
        Ok(out)
    }
}

fn collect_results(snapshot: &IndexSnapshot, rows: &[ScoredRow]) -> Vec<SearchResult> {
    rows.iter()
        .filter_map(|hit| snapshot.chunk(hit.row).map(|chunk| (chunk, hit.score)))
        .enumerate()
        .map(|(i, (chunk, score))| SearchResult {
            chunk: chunk.clone(),
            score,
            rank: i + 1,
        })
        .collect()
}

/// `Similar {target}s` / `Related functionality` / code prefix.
#[must_use]
pub fn documentation_query(target_code: &str, target: TargetType, prefix_chars: usize) -> String {
    let prefix: String = target_code.chars().take(prefix_chars).collect();
    format!("Similar {target}s\nRelated functionality\n{prefix}")
}

fn context_entry(result: &SearchResult, snippet_chars: usize) -> String {
    let chunk = &result.chunk;
    let name = chunk
        .name()
        .unwrap_or(chunk.metadata.file_path.as_str());
    let snippet: String = chunk.content.chars().take(snippet_chars).collect();
    format!(
        "Related {} '{}' (score: {:.2}):\n{snippet}...",
        chunk.kind, name, result.score
    )
}

/// Format search results as XML for injection into a prompt.
#[must_use]
pub fn format_as_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut out = String::from("<code_context>\n");

    for result in results {
        let meta = &result.chunk.metadata;
        let name = meta.name.as_deref().unwrap_or(result.chunk.kind.as_str());
        let _ = writeln!(
            out,
            "  <chunk file=\"{}\" lines=\"{}-{}\" kind=\"{}\" name=\"{}\" score=\"{:.2}\">",
            meta.file_path,
            meta.line_range.0,
            meta.line_range.1,
            result.chunk.kind,
            name,
            result.score,
        );
        out.push_str(&result.chunk.content);
        out.push_str("\n  </chunk>\n");
    }

    out.push_str("</code_context>");
    out
}
