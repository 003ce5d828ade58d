//! Source languages, their file extensions and tree-sitter grammars.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// A language the parser can be asked to handle.
///
/// C sources and headers are parsed with the C++ grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Cpp,
    Rust,
}

/// Extension (lowercase, without the dot) to language.
const EXTENSIONS: &[(&str, Lang)] = &[
    ("py", Lang::Python),
    ("pyi", Lang::Python),
    ("js", Lang::JavaScript),
    ("jsx", Lang::JavaScript),
    ("mjs", Lang::JavaScript),
    ("cjs", Lang::JavaScript),
    ("ts", Lang::TypeScript),
    ("tsx", Lang::TypeScript),
    ("mts", Lang::TypeScript),
    ("cts", Lang::TypeScript),
    ("java", Lang::Java),
    ("go", Lang::Go),
    ("cpp", Lang::Cpp),
    ("cc", Lang::Cpp),
    ("cxx", Lang::Cpp),
    ("hpp", Lang::Cpp),
    ("hh", Lang::Cpp),
    ("hxx", Lang::Cpp),
    ("c", Lang::Cpp),
    ("h", Lang::Cpp),
    ("rs", Lang::Rust),
];

impl Lang {
    pub const ALL: [Lang; 7] = [
        Lang::Python,
        Lang::JavaScript,
        Lang::TypeScript,
        Lang::Java,
        Lang::Go,
        Lang::Cpp,
        Lang::Rust,
    ];

    /// Tag stored in chunk metadata and accepted on the command line.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Cpp => "cpp",
            Self::Rust => "rust",
        }
    }

    /// File extensions mapped to this language.
    pub fn extensions(self) -> impl Iterator<Item = &'static str> {
        EXTENSIONS
            .iter()
            .filter(move |(_, lang)| *lang == self)
            .map(|(ext, _)| *ext)
    }

    /// Compiled-in grammar, or `None` when the `lang-*` feature is off.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        let language: tree_sitter::Language = match self {
            #[cfg(feature = "lang-python")]
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            #[cfg(feature = "lang-java")]
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            #[cfg(feature = "lang-go")]
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            #[cfg(feature = "lang-cpp")]
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            #[cfg(feature = "lang-rust")]
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            #[allow(unreachable_patterns)]
            _ => return None,
        };
        Some(language)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Lang {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        if let Some(lang) = Self::ALL.into_iter().find(|l| l.id() == tag) {
            return Ok(lang);
        }
        match tag.as_str() {
            "golang" => Ok(Self::Go),
            "c++" => Ok(Self::Cpp),
            other => EXTENSIONS
                .iter()
                .find(|(ext, _)| *ext == other)
                .map(|(_, lang)| *lang)
                .ok_or_else(|| IndexError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Map a path to its language by extension, case-insensitively.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, lang)| *lang)
}

/// True when the path maps to a language whose grammar is compiled in.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    detect_language(path).and_then(Lang::grammar).is_some()
}
