mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
#[cfg(feature = "candle")]
use codescope_index::embedding::BertEmbedder;
use codescope_index::embedding::DEFAULT_MODEL_ID;
use codescope_index::{
    ChunkerConfig, Embedder, HashingEmbedder, IndexerConfig, ParserConfig, RetrievalConfig,
};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting values fail validation.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first out-of-range value.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be greater than zero");
        }
        if self.embedding.provider == EmbeddingProvider::Candle
            && self.embedding.model.trim().is_empty()
        {
            bail!("embedding.model must not be empty");
        }
        if !(0.0..=1.0).contains(&self.retrieval.relevance_threshold) {
            bail!(
                "retrieval.relevance_threshold must be within [0, 1], got {}",
                self.retrieval.relevance_threshold
            );
        }
        if self.index.concurrency == 0 {
            bail!("index.concurrency must be greater than zero");
        }
        if self.parser.max_depth == 0 {
            bail!("parser.max_depth must be greater than zero");
        }
        if self.index.path.trim().is_empty() {
            bail!("index.path must not be empty");
        }
        Ok(())
    }

    #[must_use]
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            walk_timeout: Duration::from_millis(self.parser.walk_timeout_ms),
            max_depth: self.parser.max_depth,
        }
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_imports: self.chunker.max_imports,
            max_names: self.chunker.max_names,
            function_body_chars: self.chunker.function_body_chars,
            class_body_chars: self.chunker.class_body_chars,
            context_imports: self.chunker.context_imports,
        }
    }

    #[must_use]
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            relevance_threshold: self.retrieval.relevance_threshold,
            context_top_k: self.retrieval.context_top_k,
            query_prefix_chars: self.retrieval.query_prefix_chars,
            snippet_chars: self.retrieval.snippet_chars,
            max_context_chars: self.retrieval.max_context_chars,
        }
    }

    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            parser: self.parser_config(),
            chunker: self.chunker_config(),
            concurrency: self.index.concurrency,
        }
    }

    /// Build the configured embedder.
    ///
    /// The candle provider downloads the model on first use, so call this
    /// from a blocking context.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded, if the hashing
    /// embedder rejects the configured dimension, or if the candle provider
    /// is selected in a build without the `candle` feature.
    pub fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        tracing::debug!(provider = %self.embedding.provider, "creating embedder");
        match self.embedding.provider {
            EmbeddingProvider::Hashing => {
                let embedder = HashingEmbedder::new(DEFAULT_MODEL_ID, self.embedding.dimension)
                    .context("failed to create hashing embedder")?;
                Ok(Arc::new(embedder))
            }
            #[cfg(feature = "candle")]
            EmbeddingProvider::Candle => {
                let embedder = BertEmbedder::load(&self.embedding.model)
                    .with_context(|| format!("failed to load model {}", self.embedding.model))?;
                Ok(Arc::new(embedder))
            }
            #[cfg(not(feature = "candle"))]
            EmbeddingProvider::Candle => bail!(
                "embedding.provider = \"candle\" requires the `candle` feature; \
                 rebuild with it or set provider = \"hashing\""
            ),
        }
    }

    #[must_use]
    pub fn index_prefix(&self) -> PathBuf {
        PathBuf::from(&self.index.path)
    }
}

/// Pick the config file: explicit flag, then `CODESCOPE_CONFIG`, then the
/// bundled default path.
#[must_use]
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("CODESCOPE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
