//! Text embedding.
//!
//! `SentenceEmbedder` runs a multilingual sentence-embedding model in
//! process: BERT hidden states, attention-masked mean pooling, L2
//! normalization. Normalized outputs make cosine similarity and dot product
//! agree, which is what the index ranks by. The model loads lazily on first
//! use and concurrent first callers share a single in-flight load.
//!
//! `HashingEmbedder` is a deterministic bag-of-words stand-in for
//! environments without model weights. Tests lean on it heavily.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model failed to load: {0}")]
    ModelLoad(String),
    #[error("tokenization failed: {0}")]
    Tokenize(String),
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// In-process sentence-transformer model via candle.
    Sentence,
    /// Deterministic token-hashing vectors, no model files needed.
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Directory holding `config.json`, `tokenizer.json` and
    /// `model.safetensors`.
    pub model_dir: PathBuf,
    pub model_name: String,
    pub dimension: usize,
    /// Inputs are cut to this many leading characters before tokenization.
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Sentence,
            model_dir: PathBuf::from("models/paraphrase-multilingual-MiniLM-L12-v2"),
            model_name: "paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            dimension: 384,
            max_input_chars: 2000,
        }
    }
}

/// Boundary between the pipeline and whatever produces vectors.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embeds one text into a vector of `dimension()` floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Builds the embedder the configuration asks for.
pub fn build_embedder(config: &EmbeddingConfig) -> Arc<dyn TextEmbedder> {
    match config.provider {
        EmbeddingProvider::Sentence => Arc::new(SentenceEmbedder::new(config.clone())),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
    }
}

/// Model, tokenizer and device, loaded together once.
struct ModelBundle {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_seq_len: usize,
}

impl ModelBundle {
    fn load(dir: &Path) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;

        let config_path = dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).map_err(|err| {
            EmbeddingError::ModelLoad(format!("read {}: {err}", config_path.display()))
        })?;
        let config: BertConfig = serde_json::from_str(&raw_config).map_err(|err| {
            EmbeddingError::ModelLoad(format!("parse {}: {err}", config_path.display()))
        })?;

        // BertConfig keeps its fields private, so read the sequence cap
        // straight from the JSON.
        let max_seq_len = serde_json::from_str::<serde_json::Value>(&raw_config)
            .ok()
            .and_then(|v| v.get("max_position_embeddings").and_then(|m| m.as_u64()))
            .map(|m| m as usize)
            .unwrap_or(512);

        let tokenizer_path = dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
            EmbeddingError::ModelLoad(format!("load {}: {err}", tokenizer_path.display()))
        })?;

        let weights_path = dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.clone()], DType::F32, &device)
                .map_err(|err| {
                    EmbeddingError::ModelLoad(format!(
                        "load {}: {err}",
                        weights_path.display()
                    ))
                })?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|err| EmbeddingError::ModelLoad(err.to_string()))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            max_seq_len,
        })
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|err| EmbeddingError::Tokenize(err.to_string()))?;

        let mut ids = encoding.get_ids().to_vec();
        let mut mask = encoding.get_attention_mask().to_vec();
        if ids.len() > self.max_seq_len {
            ids.truncate(self.max_seq_len);
            mask.truncate(self.max_seq_len);
        }
        let len = ids.len();

        let inference = |err: candle_core::Error| EmbeddingError::Inference(err.to_string());

        let input_ids = Tensor::from_vec(ids, (1, len), &self.device).map_err(inference)?;
        let attention_mask = Tensor::from_vec(mask, (1, len), &self.device).map_err(inference)?;
        let token_type_ids = input_ids.zeros_like().map_err(inference)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(inference)?;
        let pooled = mean_pool_l2(&hidden, &attention_mask).map_err(inference)?;
        pooled
            .squeeze(0)
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(inference)
    }
}

/// Attention-masked mean over the sequence axis, then L2 normalization.
fn mean_pool_l2(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let summed = (hidden * &mask_3d)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?.clamp(1e-9, f64::MAX)?;
    let mean = summed.broadcast_div(&counts)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    mean.broadcast_div(&norm)
}

pub struct SentenceEmbedder {
    config: EmbeddingConfig,
    loaded: OnceCell<Arc<ModelBundle>>,
}

impl SentenceEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            loaded: OnceCell::new(),
        }
    }

    /// Returns the loaded model, loading it on the first call. Concurrent
    /// first callers share one in-flight load; a failed load is not cached,
    /// so later calls retry.
    async fn bundle(&self) -> Result<Arc<ModelBundle>, EmbeddingError> {
        let dir = self.config.model_dir.clone();
        let name = self.config.model_name.clone();
        self.loaded
            .get_or_try_init(|| async move {
                tracing::info!("Loading embedding model {} from {}", name, dir.display());
                let bundle = tokio::task::spawn_blocking(move || ModelBundle::load(&dir))
                    .await
                    .map_err(|err| {
                        EmbeddingError::ModelLoad(format!("model load task failed: {err}"))
                    })??;
                Ok(Arc::new(bundle))
            })
            .await
            .map(Arc::clone)
    }
}

#[async_trait]
impl TextEmbedder for SentenceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let bundle = self.bundle().await?;
        let input = truncate_chars(text, self.config.max_input_chars).to_string();

        // Inference is CPU-bound; keep it off the async workers.
        let vector = tokio::task::spawn_blocking(move || bundle.encode(&input))
            .await
            .map_err(|err| EmbeddingError::Inference(format!("embedding task failed: {err}")))??;

        if vector.len() != self.config.dimension {
            return Err(EmbeddingError::Inference(format!(
                "model produced {} dimensions, expected {}",
                vector.len(),
                self.config.dimension
            )));
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Hashes tokens into fixed buckets and L2-normalizes the result. Identical
/// texts always map to identical vectors, and texts sharing tokens land near
/// each other, which is all the non-model deployments and the test suite
/// need.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let digest = hasher.finish();
            let bucket = (digest % self.dimension as u64) as usize;
            let weight = 1.0 + ((digest >> 32) as u32 as f32) / (u32::MAX as f32);
            vector[bucket] += weight;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}
