//! Text embedding.
//!
//! [`Embedder`] is the seam for any fixed-dimension text encoder. With the
//! `candle` feature the crate ships `BertEmbedder`, a sentence-transformer
//! run locally through candle. [`HashingEmbedder`] is the offline fallback:
//! a deterministic feature-hashing encoder over code-aware tokens that needs
//! no model download.

#[cfg(feature = "candle")]
mod bert;

#[cfg(feature = "candle")]
pub use bert::BertEmbedder;

use crate::error::{IndexError, Result};

/// Fixed-dimension text encoder.
pub trait Embedder: Send + Sync {
    /// Identifier persisted next to an index and compared on load.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Encode `text`. The result is not required to be normalized.
    ///
    /// # Errors
    ///
    /// Implementation-specific encoding failures.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode several texts in order.
    ///
    /// # Errors
    ///
    /// Fails on the first text that fails to encode.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Default model identifier for [`HashingEmbedder`].
pub const DEFAULT_MODEL_ID: &str = "hashing-v1";
/// Default `HuggingFace` Hub repository for the candle embedder.
pub const DEFAULT_BERT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = 384;

const WORD_WEIGHT: f32 = 1.0;
const SUBWORD_WEIGHT: f32 = 0.5;
const TRIGRAM_WEIGHT: f32 = 0.2;

/// Signed feature hashing over words, identifier sub-words and character
/// trigrams.
///
/// Identifiers are split on `_` and lower-to-upper case transitions, so
/// `parseConfig`, `parse_config` and `ParseConfig` share sub-word features.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] if `dimension` is zero.
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::Embedding(
                "embedding dimension must be positive".into(),
            ));
        }
        Ok(Self {
            model_id: model_id.into(),
            dimension,
        })
    }

    fn add_feature(&self, vector: &mut [f32], namespace: u8, feature: &str, weight: f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[namespace]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        let h = u64::from_le_bytes(head);

        let dim = u64::try_from(self.dimension).unwrap_or(u64::MAX);
        let bucket = usize::try_from(h % dim).unwrap_or(0);
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in words(text) {
            let lower = word.to_lowercase();
            self.add_feature(&mut vector, b'w', &lower, WORD_WEIGHT);

            let parts = split_identifier(word);
            if parts.len() > 1 {
                for part in &parts {
                    self.add_feature(&mut vector, b'w', part, SUBWORD_WEIGHT);
                }
            }

            for trigram in trigrams(&lower) {
                self.add_feature(&mut vector, b't', &trigram, TRIGRAM_WEIGHT);
            }
        }
        Ok(vector)
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

/// Lowercased sub-words of a `snake_case` or `camelCase` identifier.
fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for piece in word.split('_').filter(|p| !p.is_empty()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for c in piece.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                parts.push(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current.to_lowercase());
        }
    }
    parts
}

fn trigrams(word: &str) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('#')
        .chain(word.chars())
        .chain(std::iter::once('#'))
        .collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

/// Scale `vector` to unit L2 norm. Zero vectors are left unchanged.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product of two equal-length vectors.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> HashingEmbedder {
        HashingEmbedder::default()
    }

    fn unit(text: &str) -> Vec<f32> {
        let mut v = embedder().embed(text).unwrap();
        normalize_l2(&mut v);
        v
    }

    #[test]
    fn embedding_has_configured_dimension() {
        let e = HashingEmbedder::new("m", 64).unwrap();
        assert_eq!(e.embed("fn main() {}").unwrap().len(), 64);
        assert_eq!(e.dimension(), 64);
        assert_eq!(e.model_id(), "m");
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(HashingEmbedder::new("m", 0).is_err());
    }

    #[test]
    fn embedding_is_deterministic() {
        let a = embedder().embed("def parse(config): pass").unwrap();
        let b = embedder().embed("def parse(config): pass").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let v = embedder().embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn identical_text_has_unit_similarity() {
        let v = unit("class Parser: pass");
        assert!((dot(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_higher_than_unrelated() {
        let query = unit("parse config file");
        let related = unit("def parse_config(path): return load(path)");
        let unrelated = unit("class HttpServer: def listen(self, port): pass");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn case_styles_share_subwords() {
        let camel = unit("parseConfigFile");
        let snake = unit("parse_config_file");
        let other = unit("renderWidgetTree");
        assert!(dot(&camel, &snake) > dot(&camel, &other));
    }

    #[test]
    fn split_identifier_handles_styles() {
        assert_eq!(split_identifier("parseConfig"), ["parse", "config"]);
        assert_eq!(split_identifier("parse_config"), ["parse", "config"]);
        assert_eq!(split_identifier("HTTPServer"), ["httpserver"]);
        assert_eq!(split_identifier("foo"), ["foo"]);
    }

    #[test]
    fn trigrams_are_padded() {
        assert_eq!(trigrams("foo"), ["#fo", "foo", "oo#"]);
        assert_eq!(trigrams("a"), ["#a#"]);
    }

    #[test]
    fn normalize_zero_vector_is_noop() {
        let mut v = vec![0.0f32; 4];
        normalize_l2(&mut v);
        assert_eq!(v, [0.0; 4]);
    }

    #[test]
    fn embed_batch_preserves_order() {
        let e = embedder();
        let batch = e.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(batch[0], e.embed("alpha").unwrap());
        assert_eq!(batch[1], e.embed("beta").unwrap());
    }

    mod proptest_normalize {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(128))]

            #[test]
            fn normalized_vectors_have_unit_norm(
                values in proptest::collection::vec(-100.0f32..100.0, 1..64)
            ) {
                let mut v = values.clone();
                normalize_l2(&mut v);
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if values.iter().any(|x| x.abs() > 1e-3) {
                    prop_assert!((norm - 1.0).abs() < 1e-3, "norm = {norm}");
                }
            }

            #[test]
            fn cosine_is_bounded(a in "[a-zA-Z_ ]{0,80}", b in "[a-zA-Z_ ]{0,80}") {
                let (va, vb) = (unit(&a), unit(&b));
                let score = dot(&va, &vb);
                prop_assert!((-1.0001..=1.0001).contains(&score));
            }
        }
    }
}
