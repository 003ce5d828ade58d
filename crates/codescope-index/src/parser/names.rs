//! Ordered name-resolution strategies for function and class nodes.

use regex::Regex;
use tree_sitter::Node;

/// Name given to entities no strategy could resolve.
pub const UNKNOWN_NAME: &str = "unknown";

/// Inputs shared by every strategy.
#[derive(Clone, Copy)]
pub struct NameContext<'a, 'tree> {
    pub node: Node<'tree>,
    pub source: &'a str,
    /// Grammar field holding the entity's name (`type` for Rust impl blocks).
    pub name_field: &'static str,
    pub name_kinds: &'static [&'static str],
    pub pattern: Option<&'static Regex>,
}

impl NameContext<'_, '_> {
    fn text_of(&self, node: Node<'_>) -> Option<String> {
        let text = self.source.get(node.byte_range())?.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn is_name_node(&self, node: Node<'_>) -> bool {
        self.name_kinds.contains(&node.kind())
    }
}

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStrategy {
    /// The node's name field, unwrapping generic and path types.
    NamedField,
    /// First direct child whose kind is an identifier kind.
    DirectIdentifier,
    /// The node's second child, or an identifier directly inside it.
    SecondChild,
    /// First capture of the language's name pattern over the node text.
    TextPattern,
}

/// Default order: structural lookups first, text matching last.
pub const DEFAULT_CHAIN: [NameStrategy; 4] = [
    NameStrategy::NamedField,
    NameStrategy::DirectIdentifier,
    NameStrategy::SecondChild,
    NameStrategy::TextPattern,
];

impl NameStrategy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NamedField => "named_field",
            Self::DirectIdentifier => "direct_identifier",
            Self::SecondChild => "second_child",
            Self::TextPattern => "text_pattern",
        }
    }

    /// Try to resolve a name, returning `None` to defer to the next strategy.
    #[must_use]
    pub fn resolve(self, cx: &NameContext<'_, '_>) -> Option<String> {
        match self {
            Self::NamedField => named_field(cx),
            Self::DirectIdentifier => direct_identifier(cx),
            Self::SecondChild => second_child(cx),
            Self::TextPattern => text_pattern(cx),
        }
    }
}

/// Run `chain` in order and fall back to [`UNKNOWN_NAME`].
#[must_use]
pub fn resolve_name(chain: &[NameStrategy], cx: &NameContext<'_, '_>) -> String {
    chain
        .iter()
        .find_map(|strategy| strategy.resolve(cx))
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

/// How many `type`/`name` fields to follow below the name field, enough for
/// `impl<T> fmt::Display for crate::geo::Point<T>`.
const FIELD_DEPTH: usize = 4;

fn named_field(cx: &NameContext<'_, '_>) -> Option<String> {
    let mut node = cx.node.child_by_field_name(cx.name_field)?;
    for _ in 0..FIELD_DEPTH {
        if cx.is_name_node(node) {
            return cx.text_of(node);
        }
        node = node
            .child_by_field_name("type")
            .or_else(|| node.child_by_field_name("name"))?;
    }
    cx.is_name_node(node).then(|| cx.text_of(node)).flatten()
}

fn direct_identifier(cx: &NameContext<'_, '_>) -> Option<String> {
    let mut cursor = cx.node.walk();
    let found = cx
        .node
        .children(&mut cursor)
        .find(|child| cx.is_name_node(*child));
    found.and_then(|n| cx.text_of(n))
}

fn second_child(cx: &NameContext<'_, '_>) -> Option<String> {
    let mut cursor = cx.node.walk();
    let second = cx.node.children(&mut cursor).nth(1)?;
    if cx.is_name_node(second) {
        return cx.text_of(second);
    }
    let mut inner = second.walk();
    let found = second
        .children(&mut inner)
        .find(|child| cx.is_name_node(*child));
    found.and_then(|n| cx.text_of(n))
}

fn text_pattern(cx: &NameContext<'_, '_>) -> Option<String> {
    let pattern = cx.pattern?;
    let text = cx.source.get(cx.node.byte_range())?;
    let caps = pattern.captures(text)?;
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().to_string())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::Lang;
    use crate::parser::EntityKind;
    use crate::parser::extractor::{Extractor, StructuralExtractor};

    fn first_node_of_kind<'t>(root: Node<'t>, kind: &str) -> Option<Node<'t>> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == kind {
                return Some(node);
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }

    fn with_node<R>(
        lang: Lang,
        source: &str,
        node_kind: &str,
        entity: EntityKind,
        f: impl FnOnce(&NameContext<'_, '_>) -> R,
    ) -> R {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&lang.grammar().unwrap()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        let node = first_node_of_kind(tree.root_node(), node_kind).unwrap();
        let extractor = Extractor::for_lang(lang);
        let cx = NameContext {
            node,
            source,
            name_field: extractor.name_field(node_kind),
            name_kinds: extractor.name_kinds(entity),
            pattern: extractor.name_pattern(entity),
        };
        f(&cx)
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn direct_identifier_python_def() {
        let name = with_node(
            Lang::Python,
            "def greet(name):\n    return name\n",
            "function_definition",
            EntityKind::Function,
            |cx| NameStrategy::DirectIdentifier.resolve(cx),
        );
        assert_eq!(name.as_deref(), Some("greet"));
    }

    #[cfg(feature = "lang-go")]
    #[test]
    fn second_child_go_type_declaration() {
        let source = "package main\n\ntype Server struct {\n\taddr string\n}\n";
        let (direct, second) = with_node(
            Lang::Go,
            source,
            "type_declaration",
            EntityKind::Class,
            |cx| {
                (
                    NameStrategy::DirectIdentifier.resolve(cx),
                    NameStrategy::SecondChild.resolve(cx),
                )
            },
        );
        assert_eq!(direct, None);
        assert_eq!(second.as_deref(), Some("Server"));
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn named_field_uses_impl_self_type() {
        let source = "impl<T> fmt::Display for geo::Point<T> {}\n";
        let (field, direct) = with_node(
            Lang::Rust,
            source,
            "impl_item",
            EntityKind::Class,
            |cx| {
                (
                    NameStrategy::NamedField.resolve(cx),
                    NameStrategy::DirectIdentifier.resolve(cx),
                )
            },
        );
        assert_eq!(field.as_deref(), Some("Point"));
        assert_ne!(direct.as_deref(), Some("Point"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn named_field_defers_when_field_missing() {
        let name = with_node(
            Lang::Python,
            "def f():\n    pass\n",
            "function_definition",
            EntityKind::Function,
            |cx| {
                let cx = NameContext { name_field: "receiver", ..*cx };
                NameStrategy::NamedField.resolve(&cx)
            },
        );
        assert_eq!(name, None);
    }

    #[cfg(feature = "lang-cpp")]
    #[test]
    fn second_child_cpp_declarator() {
        let name = with_node(
            Lang::Cpp,
            "int add(int a, int b) { return a + b; }\n",
            "function_definition",
            EntityKind::Function,
            |cx| NameStrategy::SecondChild.resolve(cx),
        );
        assert_eq!(name.as_deref(), Some("add"));
    }

    #[cfg(feature = "lang-cpp")]
    #[test]
    fn text_pattern_cpp_pointer_return() {
        let name = with_node(
            Lang::Cpp,
            "static char *dup(const char *s) { return 0; }\n",
            "function_definition",
            EntityKind::Function,
            |cx| resolve_name(&DEFAULT_CHAIN, cx),
        );
        assert_eq!(name, "dup");
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn empty_chain_yields_unknown() {
        let name = with_node(
            Lang::Python,
            "class Empty:\n    pass\n",
            "class_definition",
            EntityKind::Class,
            |cx| resolve_name(&[], cx),
        );
        assert_eq!(name, UNKNOWN_NAME);
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn text_pattern_without_pattern_defers() {
        let name = with_node(
            Lang::Python,
            "def f():\n    pass\n",
            "function_definition",
            EntityKind::Function,
            |cx| {
                let cx = NameContext { pattern: None, ..*cx };
                NameStrategy::TextPattern.resolve(&cx)
            },
        );
        assert_eq!(name, None);
    }

    #[test]
    fn labels_are_distinct() {
        let labels: Vec<_> = DEFAULT_CHAIN.iter().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            ["named_field", "direct_identifier", "second_child", "text_pattern"]
        );
    }
}
