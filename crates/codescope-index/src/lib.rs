//! Structural code indexing and semantic retrieval.
//!
//! Tree-sitter parses source into entities, entities become bounded chunks,
//! chunks are embedded into an exact inner-product index, and the retriever
//! assembles related code as context for documentation generation.

pub mod chunker;
pub(crate) mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod languages;
pub mod parser;
pub mod retriever;
pub mod store;

pub use chunker::{Chunk, ChunkKind, ChunkMetadata, ChunkerConfig, build_chunks};
pub use context::chunk_display_header;
#[cfg(feature = "candle")]
pub use embedding::BertEmbedder;
pub use embedding::{Embedder, HashingEmbedder};
pub use error::{IndexError, Result};
pub use index::{CodeIndex, LoadReport, ModelMismatchWarning};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use languages::{Lang, detect_language, is_indexable};
pub use parser::{
    CodeParser, Entity, EntityKind, GrammarRegistry, ParsedSource, ParserConfig, SourceFile,
};
pub use retriever::{CodeRetriever, RetrievalConfig, SearchResult, TargetType};
