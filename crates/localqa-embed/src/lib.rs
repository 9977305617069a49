//! localqa-embed
//!
//! Query embedding for the answer pipeline: a candle sentence encoder loaded
//! from local weights, and a hashing embedder for tests and offline runs.

use std::path::PathBuf;
use std::sync::Arc;

use localqa_core::traits::Embedder;
use localqa_core::{Error, Result, Settings};
use tracing::info;

mod device;
mod hashing;
mod model;
mod pool;
mod tokenize;

pub use hashing::HashEmbedder;
pub use model::SentenceEncoder;
pub use pool::masked_mean_l2;

/// Dimension used by the hashing embedder; matches all-MiniLM-L6-v2.
pub const FAKE_EMBEDDING_DIM: usize = 384;

/// [`SentenceEncoder`] behind the pipeline's [`Embedder`] trait.
pub struct CandleEmbedder {
    encoder: SentenceEncoder,
    id: String,
}

impl CandleEmbedder {
    pub fn load(model_name: &str, model_dir: &std::path::Path) -> Result<Self> {
        let encoder = SentenceEncoder::load(model_dir)
            .map_err(|e| Error::EmbeddingUnavailable(format!("{model_name}: {e:#}")))?;
        let id = format!("candle:{}:d{}", model_name, encoder.dim());
        Ok(Self { encoder, id })
    }
}

impl Embedder for CandleEmbedder {
    fn model_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.encoder.dim() }

    fn max_len(&self) -> usize { self.encoder.max_len() }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.encoder
            .embed_text(text)
            .map_err(|e| Error::EmbeddingUnavailable(format!("{e:#}")))
    }
}

/// Build the embedder selected by `settings`.
pub fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake_embeddings {
        info!("using hashing embedder (use_fake_embeddings)");
        return Ok(Arc::new(HashEmbedder::new(FAKE_EMBEDDING_DIM)));
    }
    let dir = resolve_model_dir(settings)?;
    info!(model = %settings.embeddings_model_name, dir = %dir.display(), "using candle embedder");
    Ok(Arc::new(CandleEmbedder::load(&settings.embeddings_model_name, &dir)?))
}

fn resolve_model_dir(settings: &Settings) -> Result<PathBuf> {
    let candidates = model::model_dir_candidates(&settings.model_dir(), &settings.embeddings_model_name);
    candidates
        .iter()
        .find(|p| p.join("config.json").exists())
        .cloned()
        .ok_or_else(|| {
            let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            Error::EmbeddingUnavailable(format!(
                "could not locate model '{}' (tried {})",
                settings.embeddings_model_name,
                tried.join(", ")
            ))
        })
}
