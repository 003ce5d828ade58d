//! Per-language classification of syntax nodes into structural entities.

use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::Node;

use super::EntityKind;
use crate::languages::Lang;

/// Classifies syntax-tree nodes of one language into entity kinds and
/// tells the name resolvers what an identifier looks like.
pub trait StructuralExtractor {
    /// Entity kind for a node kind, if the node is structurally significant.
    fn classify(&self, node_kind: &str) -> Option<EntityKind>;

    /// Node kinds that can carry the name of an entity of `kind`.
    fn name_kinds(&self, kind: EntityKind) -> &'static [&'static str];

    /// Fallback pattern whose first capture group is the entity name.
    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex>;

    /// Grammar field that holds the name of a node of `node_kind`.
    fn name_field(&self, _node_kind: &str) -> &'static str {
        "name"
    }

    /// Reject classified nodes that are only declarations or references.
    fn accepts(&self, _node: &Node<'_>, _kind: EntityKind) -> bool {
        true
    }
}

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("static entity name pattern is valid"));
    };
}

pattern!(PY_FUNCTION, r"def\s+([A-Za-z_]\w*)");
pattern!(PY_CLASS, r"class\s+([A-Za-z_]\w*)");
pattern!(JS_FUNCTION, r"(?:function\s*\*?\s*([A-Za-z_$][\w$]*)|([A-Za-z_$#][\w$]*)\s*\()");
pattern!(JS_CLASS, r"(?:class|interface)\s+([A-Za-z_$][\w$]*)");
pattern!(JAVA_FUNCTION, r"([A-Za-z_$][\w$]*)\s*\(");
pattern!(JAVA_CLASS, r"(?:class|interface|enum|record)\s+([A-Za-z_$][\w$]*)");
pattern!(GO_FUNCTION, r"func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)");
pattern!(GO_TYPE, r"^(?:type\s+)?([A-Za-z_]\w*)");
pattern!(CPP_FUNCTION, r"([A-Za-z_~][\w:~]*)\s*\(");
pattern!(CPP_CLASS, r"(?:class|struct)\s+([A-Za-z_]\w*)");
pattern!(RUST_FUNCTION, r"fn\s+([A-Za-z_]\w*)");
pattern!(
    RUST_TYPE,
    r"(?:struct|enum|trait|impl(?:\s*<[^>]*>)?(?:\s+[\w:]+(?:<[^>]*>)?\s+for)?)\s+([A-Za-z_]\w*)"
);

/// Python adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonExtractor;

impl StructuralExtractor for PythonExtractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        match node_kind {
            "function_definition" => Some(EntityKind::Function),
            "class_definition" => Some(EntityKind::Class),
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                Some(EntityKind::Import)
            }
            "comment" => Some(EntityKind::Comment),
            _ => None,
        }
    }

    fn name_kinds(&self, _kind: EntityKind) -> &'static [&'static str] {
        &["identifier"]
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        match kind {
            EntityKind::Function => Some(&PY_FUNCTION),
            EntityKind::Class => Some(&PY_CLASS),
            _ => None,
        }
    }
}

/// JavaScript and TypeScript adapter. The TypeScript grammar adds
/// interfaces, abstract classes and `type_identifier` class names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptExtractor {
    typescript: bool,
}

impl ScriptExtractor {
    #[must_use]
    pub fn javascript() -> Self {
        Self { typescript: false }
    }

    #[must_use]
    pub fn typescript() -> Self {
        Self { typescript: true }
    }
}

impl StructuralExtractor for ScriptExtractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        match node_kind {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                Some(EntityKind::Function)
            }
            "class_declaration" => Some(EntityKind::Class),
            "abstract_class_declaration" | "interface_declaration" if self.typescript => {
                Some(EntityKind::Class)
            }
            "import_statement" => Some(EntityKind::Import),
            "comment" => Some(EntityKind::Comment),
            _ => None,
        }
    }

    fn name_kinds(&self, kind: EntityKind) -> &'static [&'static str] {
        match kind {
            EntityKind::Class => &["identifier", "type_identifier"],
            _ => &[
                "identifier",
                "property_identifier",
                "private_property_identifier",
            ],
        }
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        match kind {
            EntityKind::Function => Some(&JS_FUNCTION),
            EntityKind::Class => Some(&JS_CLASS),
            _ => None,
        }
    }
}

/// Java adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaExtractor;

impl StructuralExtractor for JavaExtractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        match node_kind {
            "method_declaration" | "constructor_declaration" => Some(EntityKind::Function),
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration" => Some(EntityKind::Class),
            "import_declaration" => Some(EntityKind::Import),
            "line_comment" | "block_comment" => Some(EntityKind::Comment),
            _ => None,
        }
    }

    fn name_kinds(&self, _kind: EntityKind) -> &'static [&'static str] {
        &["identifier"]
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        match kind {
            EntityKind::Function => Some(&JAVA_FUNCTION),
            EntityKind::Class => Some(&JAVA_CLASS),
            _ => None,
        }
    }
}

/// Go adapter. Each type spec stands in for a class, so a grouped
/// `type ( ... )` yields one entity per type; methods are declared at top
/// level with a receiver.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoExtractor;

impl StructuralExtractor for GoExtractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        match node_kind {
            "function_declaration" | "method_declaration" => Some(EntityKind::Function),
            "type_spec" | "type_alias" => Some(EntityKind::Class),
            "import_declaration" => Some(EntityKind::Import),
            "comment" => Some(EntityKind::Comment),
            _ => None,
        }
    }

    fn name_kinds(&self, kind: EntityKind) -> &'static [&'static str] {
        match kind {
            EntityKind::Class => &["type_identifier"],
            _ => &["identifier", "field_identifier"],
        }
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        match kind {
            EntityKind::Function => Some(&GO_FUNCTION),
            EntityKind::Class => Some(&GO_TYPE),
            _ => None,
        }
    }
}

/// C and C++ adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CppExtractor;

impl StructuralExtractor for CppExtractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        match node_kind {
            "function_definition" => Some(EntityKind::Function),
            "class_specifier" | "struct_specifier" => Some(EntityKind::Class),
            "preproc_include" => Some(EntityKind::Import),
            "comment" => Some(EntityKind::Comment),
            _ => None,
        }
    }

    fn name_kinds(&self, kind: EntityKind) -> &'static [&'static str] {
        match kind {
            EntityKind::Class => &["type_identifier"],
            _ => &[
                "identifier",
                "field_identifier",
                "qualified_identifier",
                "destructor_name",
                "operator_name",
            ],
        }
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        match kind {
            EntityKind::Function => Some(&CPP_FUNCTION),
            EntityKind::Class => Some(&CPP_CLASS),
            _ => None,
        }
    }

    // `struct Foo x;` mentions a type without defining it.
    fn accepts(&self, node: &Node<'_>, kind: EntityKind) -> bool {
        kind != EntityKind::Class || node.child_by_field_name("body").is_some()
    }
}

/// Rust adapter. Structs, enums, traits and impl blocks count as classes;
/// functions inside impl and trait blocks become their methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustExtractor;

impl StructuralExtractor for RustExtractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        match node_kind {
            "function_item" | "function_signature_item" => Some(EntityKind::Function),
            "struct_item" | "enum_item" | "trait_item" | "impl_item" => Some(EntityKind::Class),
            "use_declaration" | "extern_crate_declaration" => Some(EntityKind::Import),
            "line_comment" | "block_comment" => Some(EntityKind::Comment),
            _ => None,
        }
    }

    fn name_kinds(&self, kind: EntityKind) -> &'static [&'static str] {
        match kind {
            EntityKind::Class => &["type_identifier"],
            _ => &["identifier"],
        }
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        match kind {
            EntityKind::Function => Some(&RUST_FUNCTION),
            EntityKind::Class => Some(&RUST_TYPE),
            _ => None,
        }
    }

    // `impl Trait for Type` is named after `Type`.
    fn name_field(&self, node_kind: &str) -> &'static str {
        match node_kind {
            "impl_item" => "type",
            _ => "name",
        }
    }
}

/// Statically dispatched adapter for one language.
#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    Python(PythonExtractor),
    Script(ScriptExtractor),
    Java(JavaExtractor),
    Go(GoExtractor),
    Cpp(CppExtractor),
    Rust(RustExtractor),
}

impl Extractor {
    #[must_use]
    pub fn for_lang(lang: Lang) -> Self {
        match lang {
            Lang::Python => Self::Python(PythonExtractor),
            Lang::JavaScript => Self::Script(ScriptExtractor::javascript()),
            Lang::TypeScript => Self::Script(ScriptExtractor::typescript()),
            Lang::Java => Self::Java(JavaExtractor),
            Lang::Go => Self::Go(GoExtractor),
            Lang::Cpp => Self::Cpp(CppExtractor),
            Lang::Rust => Self::Rust(RustExtractor),
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            Extractor::Python(e) => e.$method($($arg),*),
            Extractor::Script(e) => e.$method($($arg),*),
            Extractor::Java(e) => e.$method($($arg),*),
            Extractor::Go(e) => e.$method($($arg),*),
            Extractor::Cpp(e) => e.$method($($arg),*),
            Extractor::Rust(e) => e.$method($($arg),*),
        }
    };
}

impl StructuralExtractor for Extractor {
    fn classify(&self, node_kind: &str) -> Option<EntityKind> {
        dispatch!(self, classify, node_kind)
    }

    fn name_kinds(&self, kind: EntityKind) -> &'static [&'static str] {
        dispatch!(self, name_kinds, kind)
    }

    fn name_pattern(&self, kind: EntityKind) -> Option<&'static Regex> {
        dispatch!(self, name_pattern, kind)
    }

    fn name_field(&self, node_kind: &str) -> &'static str {
        dispatch!(self, name_field, node_kind)
    }

    fn accepts(&self, node: &Node<'_>, kind: EntityKind) -> bool {
        dispatch!(self, accepts, node, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_classification() {
        let e = Extractor::for_lang(Lang::Python);
        assert_eq!(e.classify("function_definition"), Some(EntityKind::Function));
        assert_eq!(e.classify("class_definition"), Some(EntityKind::Class));
        assert_eq!(e.classify("import_from_statement"), Some(EntityKind::Import));
        assert_eq!(e.classify("comment"), Some(EntityKind::Comment));
        assert_eq!(e.classify("decorated_definition"), None);
    }

    #[test]
    fn typescript_only_kinds() {
        let js = Extractor::for_lang(Lang::JavaScript);
        let ts = Extractor::for_lang(Lang::TypeScript);
        assert_eq!(js.classify("interface_declaration"), None);
        assert_eq!(ts.classify("interface_declaration"), Some(EntityKind::Class));
        assert_eq!(ts.classify("method_definition"), Some(EntityKind::Function));
    }

    #[test]
    fn java_comment_kinds() {
        let e = Extractor::for_lang(Lang::Java);
        assert_eq!(e.classify("line_comment"), Some(EntityKind::Comment));
        assert_eq!(e.classify("block_comment"), Some(EntityKind::Comment));
        assert_eq!(e.classify("comment"), None);
    }

    #[test]
    fn every_language_classifies_some_function_kind() {
        let probes = [
            (Lang::Rust, "function_item"),
            (Lang::Python, "function_definition"),
            (Lang::JavaScript, "function_declaration"),
            (Lang::TypeScript, "function_declaration"),
            (Lang::Java, "method_declaration"),
            (Lang::Go, "function_declaration"),
            (Lang::Cpp, "function_definition"),
        ];
        for (lang, kind) in probes {
            assert_eq!(
                Extractor::for_lang(lang).classify(kind),
                Some(EntityKind::Function),
                "{lang}"
            );
        }
    }

    #[test]
    fn patterns_capture_names() {
        let cases: [(&Regex, &str, &str); 9] = [
            (&PY_FUNCTION, "async def fetch(url):", "fetch"),
            (&GO_FUNCTION, "func (s *Server) Start() error {", "Start"),
            (&GO_TYPE, "type Config struct {", "Config"),
            (&GO_TYPE, "Handler func(int) error", "Handler"),
            (&CPP_FUNCTION, "static int* make_buffer(size_t n) {", "make_buffer"),
            (&JAVA_CLASS, "public final class Service {", "Service"),
            (&RUST_FUNCTION, "pub(crate) fn build() {}", "build"),
            (&RUST_TYPE, "impl<T: Clone> Display for Wrapper<T> {", "Wrapper"),
            (&JS_CLASS, "export class Widget extends Base {", "Widget"),
        ];
        for (re, text, expected) in cases {
            let caps = re.captures(text).unwrap();
            let name = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str())
                .unwrap();
            assert_eq!(name, expected, "pattern {re} on {text:?}");
        }
    }

    #[test]
    fn go_classifies_each_type_spec() {
        let e = Extractor::for_lang(Lang::Go);
        assert_eq!(e.classify("type_spec"), Some(EntityKind::Class));
        assert_eq!(e.classify("type_alias"), Some(EntityKind::Class));
        assert_eq!(e.classify("type_declaration"), None);
    }

    #[test]
    fn rust_impl_named_by_self_type() {
        let e = Extractor::for_lang(Lang::Rust);
        assert_eq!(e.name_field("impl_item"), "type");
        assert_eq!(e.name_field("struct_item"), "name");
        assert_eq!(Extractor::for_lang(Lang::Go).name_field("impl_item"), "name");
    }

    #[test]
    fn js_method_pattern_uses_second_group() {
        let caps = JS_FUNCTION.captures("  async render(props) {").unwrap();
        assert!(caps.get(1).is_none());
        assert_eq!(caps.get(2).unwrap().as_str(), "render");
    }
}
