use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

use localqa_core::traits::{Generator, TokenSink};
use localqa_core::{Error, Result, Settings};

use crate::stream::NdjsonDecoder;
use crate::truncate::PromptBudget;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_ctx: usize,
}

/// One line of Ollama's streamed `/api/generate` response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Streams completions from a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    token_timeout: Duration,
    context_window: Option<usize>,
    budget: PromptBudget,
}

impl OllamaGenerator {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("ollama_url cannot be empty".to_string()));
        }
        // No overall request timeout: long answers are fine as long as tokens keep coming.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            token_timeout: Duration::from_secs(120),
            context_window: None,
            budget: PromptBudget::default(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(&settings.ollama_url, &settings.model)?
            .with_timeout(Duration::from_secs(settings.generation_timeout_secs))
            .with_context_window(settings.context_window)
            .with_budget(PromptBudget::new(settings.max_prompt_chars, settings.truncation)))
    }

    /// Deadline for the first token and for each token after it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    pub fn with_context_window(mut self, num_ctx: Option<usize>) -> Self {
        self.context_window = num_ctx;
        self
    }

    pub fn with_budget(mut self, budget: PromptBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn model(&self) -> &str { &self.model }

    fn timed_out(&self) -> Error {
        error!(model = %self.model, timeout = ?self.token_timeout, "model server stopped producing tokens");
        Error::GenerationTimeout(self.token_timeout)
    }
}

fn generation_err(e: impl std::fmt::Display) -> Error {
    Error::GenerationFailed(e.to_string())
}

/// Applies one decoded line; returns whether the server marked the stream done.
fn apply_line(line: &str, answer: &mut String, on_token: &mut Option<TokenSink<'_>>) -> Result<bool> {
    let chunk: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| Error::GenerationFailed(format!("malformed stream line {line:?}: {e}")))?;
    if let Some(message) = chunk.error {
        return Err(Error::GenerationFailed(message));
    }
    if !chunk.response.is_empty() {
        if let Some(sink) = on_token.as_deref_mut() {
            sink(&chunk.response);
        }
        answer.push_str(&chunk.response);
    }
    Ok(chunk.done)
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, mut on_token: Option<TokenSink<'_>>) -> Result<String> {
        let start = Instant::now();
        let prompt = self.budget.apply(prompt);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: true,
            options: self.context_window.map(|num_ctx| GenerateOptions { num_ctx }),
        };
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        debug!(%url, model = %self.model, prompt_chars = prompt.chars().count(), "sending generate request");

        // Ollama answers with headers once the model is loaded and the first token is ready.
        let response = timeout(self.token_timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| self.timed_out())?
            .map_err(generation_err)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(%status, "model server error: {}", text);
            return Err(Error::GenerationFailed(format!("model server returned {status}: {text}")));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = NdjsonDecoder::new();
        let mut answer = String::new();
        let mut done = false;
        while !done {
            let next = timeout(self.token_timeout, stream.next()).await.map_err(|_| self.timed_out())?;
            let Some(bytes) = next else { break };
            for line in decoder.push(&bytes.map_err(generation_err)?) {
                done = apply_line(&line, &mut answer, &mut on_token)?;
                if done { break; }
            }
        }
        if !done {
            if let Some(line) = decoder.finish() {
                done = apply_line(&line, &mut answer, &mut on_token)?;
            }
        }
        if !done {
            return Err(Error::GenerationFailed("model server closed the stream before finishing".to_string()));
        }
        info!(model = %self.model, chars = answer.chars().count(), elapsed_ms = start.elapsed().as_millis() as u64, "generation finished");
        Ok(answer)
    }
}
