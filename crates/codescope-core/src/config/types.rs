use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserSection,
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub index: IndexSection,
}

fn default_walk_timeout_ms() -> u64 {
    2000
}

fn default_max_depth() -> usize {
    512
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserSection {
    #[serde(default = "default_walk_timeout_ms")]
    pub walk_timeout_ms: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ParserSection {
    fn default() -> Self {
        Self {
            walk_timeout_ms: default_walk_timeout_ms(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_imports() -> usize {
    5
}

fn default_max_names() -> usize {
    10
}

fn default_function_body_chars() -> usize {
    1000
}

fn default_class_body_chars() -> usize {
    1500
}

fn default_context_imports() -> usize {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkerSection {
    #[serde(default = "default_max_imports")]
    pub max_imports: usize,
    #[serde(default = "default_max_names")]
    pub max_names: usize,
    #[serde(default = "default_function_body_chars")]
    pub function_body_chars: usize,
    #[serde(default = "default_class_body_chars")]
    pub class_body_chars: usize,
    #[serde(default = "default_context_imports")]
    pub context_imports: usize,
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            max_imports: default_max_imports(),
            max_names: default_max_names(),
            function_body_chars: default_function_body_chars(),
            class_body_chars: default_class_body_chars(),
            context_imports: default_context_imports(),
        }
    }
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// BERT sentence-transformer run locally through candle.
    Candle,
    /// Offline feature-hashing encoder; needs no model download.
    Hashing,
}

impl EmbeddingProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Candle => "candle",
            Self::Hashing => "hashing",
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_provider() -> EmbeddingProvider {
    if cfg!(feature = "candle") {
        EmbeddingProvider::Candle
    } else {
        EmbeddingProvider::Hashing
    }
}

fn default_model() -> String {
    codescope_index::embedding::DEFAULT_BERT_MODEL.into()
}

fn default_dimension() -> usize {
    codescope_index::embedding::DEFAULT_DIMENSION
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingSection {
    #[serde(default = "default_provider")]
    pub provider: EmbeddingProvider,
    /// `HuggingFace` Hub repository loaded by the candle provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Vector width of the hashing provider. The candle provider takes it
    /// from the model's `hidden_size`.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimension: default_dimension(),
        }
    }
}

fn default_relevance_threshold() -> f32 {
    0.3
}

fn default_context_top_k() -> usize {
    3
}

fn default_query_prefix_chars() -> usize {
    200
}

fn default_snippet_chars() -> usize {
    300
}

fn default_max_context_chars() -> usize {
    4000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalSection {
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    #[serde(default = "default_context_top_k")]
    pub context_top_k: usize,
    #[serde(default = "default_query_prefix_chars")]
    pub query_prefix_chars: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            context_top_k: default_context_top_k(),
            query_prefix_chars: default_query_prefix_chars(),
            snippet_chars: default_snippet_chars(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_index_path() -> String {
    ".codescope/index".into()
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSection {
    /// Persistence prefix; `<path>.vectors` and `<path>.meta.json` are written.
    #[serde(default = "default_index_path")]
    pub path: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            concurrency: default_concurrency(),
        }
    }
}
