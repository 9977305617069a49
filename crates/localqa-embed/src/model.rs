use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

enum Backbone {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

/// Transformer encoder with masked mean pooling, loaded from a local
/// sentence-transformers style directory.
pub struct SentenceEncoder {
    backbone: Backbone,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl SentenceEncoder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let meta: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = meta.get("hidden_size").and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
        let max_positions = meta.get("max_position_embeddings").and_then(serde_json::Value::as_u64).unwrap_or(512) as usize;
        let model_type = meta.get("model_type").and_then(serde_json::Value::as_str).unwrap_or("bert").to_string();

        let vb = load_weights(model_dir, &device)?;
        let backbone = match model_type.as_str() {
            "xlm-roberta" => {
                let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
                Backbone::XlmRoberta(XLMRobertaModel::new(&config, vb)?)
            }
            "bert" => {
                let config: BertConfig = serde_json::from_str(&raw_config)?;
                Backbone::Bert(BertModel::load(vb, &config)?)
            }
            other => return Err(anyhow!("Unsupported model_type '{}'", other)),
        };

        // RoBERTa-style position ids start at padding_idx + 1.
        let max_len = match &backbone { Backbone::XlmRoberta(_) => max_positions.saturating_sub(2), Backbone::Bert(_) => max_positions }.min(512);
        info!(model_type = %model_type, dim, max_len, "embedding model loaded");
        Ok(Self { backbone, tokenizer, device, dim, max_len })
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn max_len(&self) -> usize { self.max_len }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = match &self.backbone {
            Backbone::Bert(model) => model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?,
            Backbone::XlmRoberta(model) => model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?,
        };
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != self.dim { return Err(anyhow!("encoder produced {} values, expected {}", emb.len(), self.dim)); }
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 250 { warn!(?elapsed, "slow embedding"); } else { debug!(?elapsed, "embedded query"); }
        Ok(emb)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        debug!(path = %safetensors.display(), "mmap safetensors weights");
        // SAFETY: the weights file is not modified while the encoder is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        debug!(path = %pickle.display(), "reading pytorch weights");
        let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&pickle)?.into_iter().collect();
        return Ok(VarBuilder::from_tensors(weights, DType::F32, device));
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin under {}", model_dir.display()))
}

/// Candidate directories for a model name, most specific first.
pub fn model_dir_candidates(configured: &Path, model_name: &str) -> Vec<PathBuf> {
    vec![
        configured.to_path_buf(),
        PathBuf::from("models").join(model_name),
        PathBuf::from("../models").join(model_name),
    ]
}
