use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};

use super::Embedder;
use crate::error::{IndexError, Result};

/// BERT sentence encoder loaded from the `HuggingFace` Hub, mean-pooled and
/// L2-normalized.
#[derive(Clone)]
pub struct BertEmbedder {
    model_id: String,
    dimension: usize,
    model: Arc<BertModel>,
    tokenizer: Tokenizer,
    device: Device,
}

impl std::fmt::Debug for BertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEmbedder")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl BertEmbedder {
    /// Download (or reuse the cached copy of) `repo_id` and load it on the CPU.
    ///
    /// Blocks on network and disk IO; call from a blocking context.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] if a model file cannot be fetched or
    /// parsed, and [`IndexError::Candle`] if the weights fail to load.
    pub fn load(repo_id: &str) -> Result<Self> {
        Self::load_on(repo_id, &Device::Cpu)
    }

    /// [`BertEmbedder::load`] on an explicit device.
    ///
    /// # Errors
    ///
    /// See [`BertEmbedder::load`].
    pub fn load_on(repo_id: &str, device: &Device) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            IndexError::Embedding(format!("failed to create HuggingFace API client: {e}"))
        })?;
        let repo = api.model(repo_id.to_owned());
        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                IndexError::Embedding(format!("failed to download {file} from {repo_id}: {e}"))
            })
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_str = std::fs::read_to_string(&config_path)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| IndexError::Embedding(format!("invalid BERT config: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| IndexError::Embedding(format!("failed to load tokenizer: {e}")))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_position_embeddings,
                ..TruncationParams::default()
            }))
            .map_err(|e| IndexError::Embedding(format!("invalid truncation: {e}")))?;

        // SAFETY: file is a valid safetensors downloaded from hf-hub, not modified during
        // VarBuilder lifetime
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = BertModel::load(vb, &config)?;

        tracing::info!(model = repo_id, dimension = config.hidden_size, "embedding model loaded");
        Ok(Self {
            model_id: repo_id.to_owned(),
            dimension: config.hidden_size,
            model: Arc::new(model),
            tokenizer,
            device: device.clone(),
        })
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| IndexError::Embedding(format!("tokenizer encode failed: {e}")))?;

        let token_ids = encoding.get_ids();
        let token_type_ids: Vec<u32> = vec![0; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        mean_pool_normalize(&hidden)
    }
}

/// Mean over the sequence axis of a `(1, seq, hidden)` tensor, scaled to unit
/// L2 norm.
fn mean_pool_normalize(hidden: &Tensor) -> Result<Vec<f32>> {
    let seq_len = u32::try_from(hidden.dim(1)?)
        .map_err(|e| IndexError::Embedding(format!("sequence length overflow: {e}")))?;
    let mean = (hidden.sum(1)? / f64::from(seq_len))?;

    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
    let normalized = mean.broadcast_div(&norm)?.squeeze(0)?;
    Ok(normalized.to_vec1::<f32>()?)
}
