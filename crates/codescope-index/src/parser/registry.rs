//! Grammar registry built once and injected into [`super::CodeParser`].

use std::collections::HashMap;

use tree_sitter::Parser;

use crate::languages::Lang;

/// Validated tree-sitter grammars keyed by language.
///
/// Languages whose grammar is not compiled in, or whose grammar fails to
/// load into a parser, are reported once at construction and are
/// unsupported for the lifetime of the registry.
#[derive(Clone)]
pub struct GrammarRegistry {
    grammars: HashMap<Lang, tree_sitter::Language>,
}

impl GrammarRegistry {
    /// Register every language in [`Lang::ALL`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_languages(&Lang::ALL)
    }

    /// Register only `langs`.
    #[must_use]
    pub fn with_languages(langs: &[Lang]) -> Self {
        let mut grammars = HashMap::with_capacity(langs.len());
        for &lang in langs {
            let Some(grammar) = lang.grammar() else {
                tracing::debug!(language = %lang, "grammar not compiled in");
                continue;
            };
            let mut parser = Parser::new();
            match parser.set_language(&grammar) {
                Ok(()) => {
                    tracing::info!(language = %lang, "grammar registered");
                    grammars.insert(lang, grammar);
                }
                Err(e) => {
                    tracing::warn!(language = %lang, "grammar failed to initialize: {e}");
                }
            }
        }
        Self { grammars }
    }

    #[must_use]
    pub fn get(&self, lang: Lang) -> Option<&tree_sitter::Language> {
        self.grammars.get(&lang)
    }

    #[must_use]
    pub fn is_supported(&self, lang: Lang) -> bool {
        self.grammars.contains_key(&lang)
    }

    /// Supported languages in declaration order.
    #[must_use]
    pub fn supported(&self) -> Vec<Lang> {
        Lang::ALL
            .into_iter()
            .filter(|l| self.grammars.contains_key(l))
            .collect()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("supported", &self.supported())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_enabled_languages() {
        let registry = GrammarRegistry::new();
        for lang in Lang::ALL {
            assert_eq!(registry.is_supported(lang), lang.grammar().is_some());
        }
    }

    #[test]
    fn with_languages_restricts_set() {
        let registry = GrammarRegistry::with_languages(&[]);
        assert!(registry.supported().is_empty());
        assert!(registry.get(Lang::Python).is_none());
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn subset_registry_only_has_requested() {
        let registry = GrammarRegistry::with_languages(&[Lang::Python]);
        assert_eq!(registry.supported(), vec![Lang::Python]);
        assert!(!registry.is_supported(Lang::Java));
    }

    #[test]
    fn debug_lists_supported() {
        let dbg = format!("{:?}", GrammarRegistry::with_languages(&[]));
        assert!(dbg.contains("GrammarRegistry"));
    }
}
