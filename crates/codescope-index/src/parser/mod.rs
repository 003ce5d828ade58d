//! Structural parsing: source text to an ordered list of entities.
//!
//! A [`CodeParser`] owns a [`GrammarRegistry`], parses text with tree-sitter
//! and walks the tree with an explicit work-stack, classifying nodes through
//! the language's [`extractor::StructuralExtractor`] and naming them with the
//! [`names`] strategy chain. Syntax errors never fail a parse; the caller gets
//! whatever entities the error-tolerant tree still contains.

pub mod extractor;
pub mod names;
pub mod registry;

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tree_sitter::Node;

use crate::error::{IndexError, Result};
use crate::languages::Lang;
use extractor::{Extractor, StructuralExtractor};
use names::{DEFAULT_CHAIN, NameContext, resolve_name};
pub use registry::GrammarRegistry;

/// How often (in visited nodes) the walk checks its deadline and token.
const CHECK_INTERVAL: usize = 256;

/// Structural category of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Class,
    Import,
    Comment,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Import => "import",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structurally significant unit extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    /// Tree-sitter node kind the entity came from.
    pub node_kind: &'static str,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub text: String,
    /// Index of the innermost enclosing function or class entity.
    pub parent: Option<usize>,
}

/// A source file as handed to the parser. Immutable once read.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub language: Lang,
    pub text: String,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<String>, language: Lang, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language,
            text: text.into(),
        }
    }
}

/// Result of parsing one file.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub language: Lang,
    /// Entities in document order. `parent` indexes into this vector.
    pub entities: Vec<Entity>,
    /// The tree contained `ERROR` or `MISSING` nodes.
    pub has_syntax_errors: bool,
    /// `false` when the walk stopped early (deadline, depth or cancellation).
    pub complete: bool,
}

impl ParsedSource {
    /// Top-level functions (not methods, not nested functions).
    pub fn functions(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| e.kind == EntityKind::Function && e.parent.is_none())
    }

    /// Every class entity, including nested ones.
    pub fn classes(&self) -> impl Iterator<Item = &Entity> {
        self.of_kind(EntityKind::Class)
    }

    pub fn imports(&self) -> impl Iterator<Item = &Entity> {
        self.of_kind(EntityKind::Import)
    }

    pub fn comments(&self) -> impl Iterator<Item = &Entity> {
        self.of_kind(EntityKind::Comment)
    }

    /// Functions whose innermost enclosing entity is the class at `class_idx`.
    pub fn methods_of(&self, class_idx: usize) -> impl Iterator<Item = &Entity> {
        methods_of(&self.entities, class_idx)
    }

    fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }
}

pub(crate) fn methods_of(entities: &[Entity], class_idx: usize) -> impl Iterator<Item = &Entity> {
    entities
        .iter()
        .filter(move |e| e.kind == EntityKind::Function && e.parent == Some(class_idx))
}

/// Limits applied to a single tree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Wall-clock budget for walking one file's tree.
    pub walk_timeout: Duration,
    /// Nodes nested deeper than this are not visited.
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            walk_timeout: Duration::from_secs(2),
            max_depth: 512,
        }
    }
}

/// Multi-language structural parser.
#[derive(Debug, Clone, Default)]
pub struct CodeParser {
    registry: GrammarRegistry,
    config: ParserConfig,
}

impl CodeParser {
    #[must_use]
    pub fn new(registry: GrammarRegistry, config: ParserConfig) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Parse `text` as `lang` and extract its entities.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnsupportedLanguage`] if the registry has no
    /// grammar for `lang`. Syntax errors are not errors.
    pub fn parse(&self, text: &str, lang: Lang) -> Result<ParsedSource> {
        self.parse_with_cancel(text, lang, None)
    }

    /// Parse with a language tag such as `"python"` or `"cpp"`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnsupportedLanguage`] for unknown tags or
    /// languages without a registered grammar.
    pub fn parse_tagged(&self, text: &str, tag: &str) -> Result<ParsedSource> {
        self.parse(text, tag.parse()?)
    }

    /// Parse a [`SourceFile`].
    ///
    /// # Errors
    ///
    /// See [`CodeParser::parse`].
    pub fn parse_file(&self, file: &SourceFile) -> Result<ParsedSource> {
        self.parse(&file.text, file.language)
    }

    /// Parse, stopping early when `cancel` fires or the time budget runs out.
    ///
    /// The budget covers both the tree-sitter parse and the walk. A walk cut
    /// short yields a partial result with `complete == false`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnsupportedLanguage`] if the registry has no
    /// grammar for `lang`, [`IndexError::Cancelled`] if `cancel` fires during
    /// the parse, and [`IndexError::Parse`] if the parse exceeds the budget.
    pub fn parse_with_cancel(
        &self,
        text: &str,
        lang: Lang,
        cancel: Option<&CancellationToken>,
    ) -> Result<ParsedSource> {
        let grammar = self
            .registry
            .get(lang)
            .ok_or_else(|| IndexError::UnsupportedLanguage(lang.id().to_string()))?;

        let mut parser = tree_sitter::Parser::new();
        if let Err(e) = parser.set_language(grammar) {
            tracing::warn!(language = %lang, "set_language failed: {e}");
            return Err(IndexError::UnsupportedLanguage(lang.id().to_string()));
        }

        let deadline = Instant::now() + self.config.walk_timeout;
        let bytes = text.as_bytes();
        let mut read =
            |offset: usize, _: tree_sitter::Point| bytes.get(offset..).unwrap_or_default();
        let mut progress = |_: &tree_sitter::ParseState| {
            if cancel.is_some_and(CancellationToken::is_cancelled) || Instant::now() >= deadline {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let options = tree_sitter::ParseOptions::new().progress_callback(&mut progress);
        let Some(tree) = parser.parse_with_options(&mut read, None, Some(options)) else {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(IndexError::Cancelled);
            }
            tracing::debug!(language = %lang, "tree-sitter returned no tree");
            return Err(IndexError::Parse(format!(
                "{lang} parse did not finish within {:?}",
                self.config.walk_timeout
            )));
        };

        let root = tree.root_node();
        let walk = Walk {
            source: text,
            extractor: Extractor::for_lang(lang),
            max_depth: self.config.max_depth,
            deadline,
            cancel,
        };
        let (entities, complete) = walk.run(root);

        let has_syntax_errors = root.has_error();
        if has_syntax_errors {
            tracing::debug!(language = %lang, entities = entities.len(), "syntax errors, partial result");
        }

        Ok(ParsedSource {
            language: lang,
            entities,
            has_syntax_errors,
            complete,
        })
    }
}

struct Walk<'a> {
    source: &'a str,
    extractor: Extractor,
    max_depth: usize,
    deadline: Instant,
    cancel: Option<&'a CancellationToken>,
}

struct Frame<'tree> {
    node: Node<'tree>,
    parent: Option<usize>,
    depth: usize,
}

impl Walk<'_> {
    /// Pre-order walk over named nodes. Returns entities in document order
    /// and whether the whole tree was visited.
    fn run(&self, root: Node<'_>) -> (Vec<Entity>, bool) {
        let mut arena: Vec<Entity> = Vec::new();
        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut complete = true;
        let mut visited = 0usize;

        push_children(&mut stack, root, None, 1);

        while let Some(frame) = stack.pop() {
            visited += 1;
            if visited % CHECK_INTERVAL == 0 && self.should_stop() {
                complete = false;
                break;
            }

            let node = frame.node;
            let mut parent = frame.parent;

            if let Some(kind) = self.extractor.classify(node.kind())
                && self.extractor.accepts(&node, kind)
            {
                arena.push(self.make_entity(node, kind, frame.parent));
                if matches!(kind, EntityKind::Import | EntityKind::Comment) {
                    continue;
                }
                parent = Some(arena.len() - 1);
            }

            if frame.depth >= self.max_depth {
                if node.named_child_count() > 0 {
                    complete = false;
                }
                continue;
            }
            push_children(&mut stack, node, parent, frame.depth + 1);
        }

        (arena, complete)
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_some_and(CancellationToken::is_cancelled) || Instant::now() >= self.deadline
    }

    fn make_entity(&self, node: Node<'_>, kind: EntityKind, parent: Option<usize>) -> Entity {
        let text = self.source.get(node.byte_range()).unwrap_or_default();
        let name = match kind {
            EntityKind::Function | EntityKind::Class => {
                let cx = NameContext {
                    node,
                    source: self.source,
                    name_field: self.extractor.name_field(node.kind()),
                    name_kinds: self.extractor.name_kinds(kind),
                    pattern: self.extractor.name_pattern(kind),
                };
                resolve_name(&DEFAULT_CHAIN, &cx)
            }
            EntityKind::Import => collapse_whitespace(text),
            EntityKind::Comment => EntityKind::Comment.as_str().to_string(),
        };

        Entity {
            kind,
            name,
            node_kind: node.kind(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            text: text.to_string(),
            parent,
        }
    }
}

fn push_children<'tree>(
    stack: &mut Vec<Frame<'tree>>,
    node: Node<'tree>,
    parent: Option<usize>,
    depth: usize,
) {
    let mut cursor = node.walk();
    let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
    stack.extend(children.into_iter().rev().map(|node| Frame {
        node,
        parent,
        depth,
    }));
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
