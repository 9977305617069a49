use async_trait::async_trait;
use std::sync::Mutex;

use localqa_core::traits::{Generator, TokenSink};
use localqa_core::Result;

pub const CANNED_REPLY: &str = "I don't know: no language model is configured, this is a canned reply.";

/// Offline generator that streams a fixed reply word by word and records
/// every prompt it receives.
#[derive(Debug)]
pub struct CannedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl Default for CannedGenerator {
    fn default() -> Self { Self::new(CANNED_REPLY) }
}

impl CannedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), prompts: Mutex::new(Vec::new()) }
    }

    /// Prompts seen so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(&self, prompt: &str, mut on_token: Option<TokenSink<'_>>) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let mut answer = String::with_capacity(self.reply.len());
        for token in self.reply.split_inclusive(' ') {
            if let Some(sink) = on_token.as_deref_mut() {
                sink(token);
            }
            answer.push_str(token);
        }
        Ok(answer)
    }
}
