//! Chunk content rendering.
//!
//! The rendered text is what gets embedded, so it leads with the entity kind
//! and name, then the language and file, then the (bounded) code and a few
//! of the file's imports.

use crate::chunker::{Chunk, ChunkerConfig, FileOutline, truncate_chars};
use crate::parser::Entity;

/// File summary: counts, leading imports and entity names.
pub(crate) fn file_summary(outline: &FileOutline<'_>, config: &ChunkerConfig) -> String {
    let mut parts = vec![
        format!("File: {}", outline.file_name),
        format!("Language: {}", outline.language),
        format!("Functions: {}", outline.functions.len()),
        format!("Classes: {}", outline.classes.len()),
    ];

    if !outline.imports.is_empty() {
        parts.push(format!(
            "Imports: {}",
            join_first(&outline.imports, config.max_imports)
        ));
    }

    let function_names: Vec<&str> = outline.functions.iter().map(|f| f.name.as_str()).collect();
    if !function_names.is_empty() {
        parts.push(format!(
            "Function names: {}",
            join_first(&function_names, config.max_names)
        ));
    }

    let class_names: Vec<&str> = outline.classes.iter().map(|(c, _)| c.name.as_str()).collect();
    if !class_names.is_empty() {
        parts.push(format!(
            "Class names: {}",
            join_first(&class_names, config.max_names)
        ));
    }

    parts.join("\n")
}

/// Function chunk content. Returns the text and whether the body was cut.
pub(crate) fn function_context(
    func: &Entity,
    outline: &FileOutline<'_>,
    config: &ChunkerConfig,
) -> (String, bool) {
    let mut parts = vec![
        format!("Function: {}", func.name),
        format!("Language: {}", outline.language),
        format!("File: {}", outline.file_name),
    ];
    let truncated = push_code(&mut parts, &func.text, config.function_body_chars);
    push_imports(&mut parts, outline, config);
    (parts.join("\n"), truncated)
}

/// Class chunk content with its method names.
pub(crate) fn class_context(
    class: &Entity,
    methods: &[&str],
    outline: &FileOutline<'_>,
    config: &ChunkerConfig,
) -> (String, bool) {
    let mut parts = vec![
        format!("Class: {}", class.name),
        format!("Language: {}", outline.language),
        format!("File: {}", outline.file_name),
    ];
    if !methods.is_empty() {
        parts.push(format!("Methods: {}", methods.join(", ")));
    }
    let truncated = push_code(&mut parts, &class.text, config.class_body_chars);
    push_imports(&mut parts, outline, config);
    (parts.join("\n"), truncated)
}

fn push_code(parts: &mut Vec<String>, body: &str, max_chars: usize) -> bool {
    if body.trim().is_empty() {
        return false;
    }
    let (code, truncated) = truncate_chars(body, max_chars);
    parts.push(format!("Code:\n{code}"));
    truncated
}

fn push_imports(parts: &mut Vec<String>, outline: &FileOutline<'_>, config: &ChunkerConfig) {
    if !outline.imports.is_empty() && config.context_imports > 0 {
        parts.push(format!(
            "File imports: {}",
            join_first(&outline.imports, config.context_imports)
        ));
    }
}

fn join_first(items: &[&str], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generate a short header for display in retrieved results.
#[must_use]
pub fn chunk_display_header(chunk: &Chunk) -> String {
    let meta = &chunk.metadata;
    let name = meta.name.as_deref().unwrap_or(chunk.kind.as_str());
    format!(
        "{} :: {} (lines {}-{})",
        meta.file_path, name, meta.line_range.0, meta.line_range.1
    )
}
