//! Entity-to-chunk conversion: one file summary plus one chunk per
//! top-level function and per class.

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::{class_context, file_summary, function_context};
use crate::languages::Lang;
use crate::parser::{Entity, EntityKind, ParsedSource};

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Retrieval unit granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    File,
    Function,
    Class,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Class => "class",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub language: Lang,
    /// Entity name; `None` for file chunks.
    pub name: Option<String>,
    /// 1-based, inclusive.
    pub line_range: (usize, usize),
    /// Top-level functions in the file (file chunks) or 0.
    pub function_count: usize,
    /// Classes in the file (file chunks) or 0.
    pub class_count: usize,
    /// Methods of the class (class chunks) or of all classes (file chunks).
    pub method_count: usize,
    /// blake3 of `content`.
    pub content_hash: String,
    /// The entity body was cut to the configured bound.
    pub truncated: bool,
}

/// Bounded text plus metadata, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> Lang {
        self.metadata.language
    }
}

/// Chunker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Imports listed in the file summary (default: 5).
    pub max_imports: usize,
    /// Function and class names listed in the file summary (default: 10).
    pub max_names: usize,
    /// Function body bound in characters (default: 1000).
    pub function_body_chars: usize,
    /// Class body bound in characters (default: 1500).
    pub class_body_chars: usize,
    /// Imports appended to function and class chunks (default: 3).
    pub context_imports: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_imports: 5,
            max_names: 10,
            function_body_chars: 1000,
            class_body_chars: 1500,
            context_imports: 3,
        }
    }
}

/// Structural view of one file shared by the renderers.
pub(crate) struct FileOutline<'a> {
    pub file_name: &'a str,
    pub language: Lang,
    pub imports: Vec<&'a str>,
    pub functions: Vec<&'a Entity>,
    /// Class entities with the names of their methods.
    pub classes: Vec<(&'a Entity, Vec<&'a str>)>,
}

impl<'a> FileOutline<'a> {
    fn new(file_path: &'a str, language: Lang, entities: &'a [Entity]) -> Self {
        let file_name = Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_path);

        let mut imports = Vec::new();
        let mut functions = Vec::new();
        let mut classes = Vec::new();
        for (idx, entity) in entities.iter().enumerate() {
            match entity.kind {
                EntityKind::Import => imports.push(entity.name.as_str()),
                EntityKind::Function if entity.parent.is_none() => functions.push(entity),
                EntityKind::Class => {
                    let methods = crate::parser::methods_of(entities, idx)
                        .map(|m| m.name.as_str())
                        .collect();
                    classes.push((entity, methods));
                }
                EntityKind::Function | EntityKind::Comment => {}
            }
        }

        Self {
            file_name,
            language,
            imports,
            functions,
            classes,
        }
    }

    fn method_count(&self) -> usize {
        self.classes.iter().map(|(_, m)| m.len()).sum()
    }

    fn line_span(entities: &[Entity]) -> (usize, usize) {
        let end = entities.iter().map(|e| e.end_line).max().unwrap_or(1);
        (1, end.max(1))
    }
}

/// Build the chunks for one parsed file.
///
/// Always emits exactly one [`ChunkKind::File`] chunk first, then one chunk
/// per top-level function and per class in document order. Entities with
/// duplicate names are kept as separate chunks.
#[must_use]
pub fn build_chunks(
    file_path: &str,
    language: Lang,
    entities: &[Entity],
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let outline = FileOutline::new(file_path, language, entities);
    let mut chunks = Vec::with_capacity(1 + outline.functions.len() + outline.classes.len());

    let summary = file_summary(&outline, config);
    chunks.push(make_chunk(
        ChunkKind::File,
        summary,
        ChunkMetadata {
            file_path: file_path.to_string(),
            language,
            name: None,
            line_range: FileOutline::line_span(entities),
            function_count: outline.functions.len(),
            class_count: outline.classes.len(),
            method_count: outline.method_count(),
            content_hash: String::new(),
            truncated: false,
        },
    ));

    // Re-walk in document order so functions and classes interleave as written.
    let mut functions = outline.functions.iter().peekable();
    let mut classes = outline.classes.iter().peekable();
    loop {
        let take_function = match (functions.peek(), classes.peek()) {
            (Some(f), Some((c, _))) => f.start_byte <= c.start_byte,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let chunk = if take_function {
            let Some(func) = functions.next() else { break };
            let (content, truncated) = function_context(func, &outline, config);
            make_chunk(
                ChunkKind::Function,
                content,
                entity_metadata(file_path, language, func, 0, truncated),
            )
        } else {
            let Some((class, methods)) = classes.next() else { break };
            let (content, truncated) = class_context(class, methods, &outline, config);
            make_chunk(
                ChunkKind::Class,
                content,
                entity_metadata(file_path, language, class, methods.len(), truncated),
            )
        };
        chunks.push(chunk);
    }

    tracing::debug!(file = %file_path, chunks = chunks.len(), "chunks built");
    chunks
}

/// [`build_chunks`] over a [`ParsedSource`].
#[must_use]
pub fn chunk_parsed(file_path: &str, parsed: &ParsedSource, config: &ChunkerConfig) -> Vec<Chunk> {
    build_chunks(file_path, parsed.language, &parsed.entities, config)
}

fn entity_metadata(
    file_path: &str,
    language: Lang,
    entity: &Entity,
    method_count: usize,
    truncated: bool,
) -> ChunkMetadata {
    ChunkMetadata {
        file_path: file_path.to_string(),
        language,
        name: Some(entity.name.clone()),
        line_range: (entity.start_line, entity.end_line),
        function_count: 0,
        class_count: 0,
        method_count,
        content_hash: String::new(),
        truncated,
    }
}

fn make_chunk(kind: ChunkKind, content: String, mut metadata: ChunkMetadata) -> Chunk {
    metadata.content_hash = blake3_hex(&content);
    Chunk {
        kind,
        content,
        metadata,
    }
}

/// Keep the first `max_chars` characters of `text`, appending [`ELLIPSIS`]
/// when anything was cut. Returns whether truncation happened.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> (Cow<'_, str>, bool) {
    match text.char_indices().nth(max_chars) {
        None => (Cow::Borrowed(text), false),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + ELLIPSIS.len());
            out.push_str(&text[..cut]);
            out.push_str(ELLIPSIS);
            (Cow::Owned(out), true)
        }
    }
}

pub(crate) fn blake3_hex(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}
