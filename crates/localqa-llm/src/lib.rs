//! localqa-llm
//!
//! Answer generation: a streaming Ollama client, the prompt budget applied
//! before sending, and a canned generator for offline runs.

use std::sync::Arc;

use localqa_core::traits::Generator;
use localqa_core::{Result, Settings};
use tracing::info;

mod canned;
mod ollama;
mod stream;
mod truncate;

pub use canned::{CannedGenerator, CANNED_REPLY};
pub use ollama::OllamaGenerator;
pub use stream::NdjsonDecoder;
pub use truncate::PromptBudget;

/// Build the generator selected by `settings`.
pub fn load_generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
    if settings.use_fake_llm {
        info!("using canned generator (use_fake_llm)");
        return Ok(Arc::new(CannedGenerator::default()));
    }
    info!(model = %settings.model, url = %settings.ollama_url, "using ollama generator");
    Ok(Arc::new(OllamaGenerator::from_settings(settings)?))
}
