//! Error types for codescope-index.

/// Errors that can occur while parsing, indexing, or querying code.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A source file could not be read. Batch operations skip the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tree-sitter produced no tree (timeout or cancelled parse). Batch
    /// operations log and skip the file.
    #[error("parse failed: {0}")]
    Parse(String),

    /// Language tag outside the supported set, or its grammar failed to load.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A query or save was attempted before any successful build or load.
    #[error("index not built: call build() or load() first")]
    IndexNotBuilt,

    /// Saving or loading index artifacts failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Vector length does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The operation observed a cancelled token.
    #[error("operation cancelled")]
    Cancelled,

    /// The embedding model failed to load or to encode text.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Whether the error is scoped to a single file and safe to skip in a batch.
    #[must_use]
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Parse(_) | Self::UnsupportedLanguage(_)
        )
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
