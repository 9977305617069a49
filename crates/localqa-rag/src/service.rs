use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use localqa_core::traits::{Generator, TokenSink};
use localqa_core::types::{Answer, Query, TruncationPolicy};
use localqa_core::{Result, Settings};
use localqa_llm::PromptBudget;

use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;

/// Per-call knobs for [`QueryService::ask`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AskOptions {
    /// Number of chunks to retrieve; `None` uses the configured default.
    pub k: Option<usize>,
    /// Leave `Answer::sources` empty. The generated text is unaffected.
    pub hide_sources: bool,
}

/// validate -> retrieve -> assemble -> generate.
///
/// Errors from any stage surface unchanged; nothing is retried.
pub struct QueryService {
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
    default_k: usize,
    budget: PromptBudget,
}

impl QueryService {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, default_k: usize) -> Self {
        Self { retriever, assembler: PromptAssembler, generator, default_k, budget: PromptBudget::default() }
    }

    /// Budget used by the `drop-lowest-ranked` policy.
    pub fn with_budget(mut self, budget: PromptBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Wires the embedder, the persisted index and the generator named by `settings`.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = localqa_embed::load_embedder(settings)?;
        let index = localqa_vector::open_index(settings).await?;
        let generator = localqa_llm::load_generator(settings)?;
        let retriever = Retriever::new(embedder, index, settings.metric);
        Ok(Self::new(retriever, generator, settings.target_source_chunks)
            .with_budget(PromptBudget::new(settings.max_prompt_chars, settings.truncation)))
    }

    pub fn default_k(&self) -> usize { self.default_k }

    pub async fn ask(&self, query_text: &str, opts: AskOptions, on_token: Option<TokenSink<'_>>) -> Result<Answer> {
        let start = Instant::now();
        let query = Query::new(query_text, opts.k.unwrap_or(self.default_k))?;

        let mut retrieved = self.retriever.retrieve(&query.text, query.k).await?;
        let mut prompt = self.assembler.assemble(&query.text, &retrieved);
        if self.budget.policy == TruncationPolicy::DropLowestRanked {
            let before = retrieved.len();
            while !self.budget.fits(&prompt) && retrieved.pop_lowest().is_some() {
                prompt = self.assembler.assemble(&query.text, &retrieved);
            }
            if retrieved.len() < before {
                warn!(dropped = before - retrieved.len(), kept = retrieved.len(), "prompt over budget; dropped lowest-ranked chunks");
            }
        }
        let retrieved_in = start.elapsed();

        let text = self.generator.generate(&prompt, on_token).await?;
        let sources = if opts.hide_sources { Vec::new() } else { retrieved.into_chunks() };
        info!(
            k = query.k,
            sources = sources.len(),
            retrieve_ms = retrieved_in.as_millis() as u64,
            total_ms = start.elapsed().as_millis() as u64,
            "answered query"
        );
        Ok(Answer { text, sources })
    }

    /// Default k, no streaming, sources hidden; returns the answer text only.
    pub async fn ask_llm(&self, question: &str) -> Result<String> {
        let opts = AskOptions { k: None, hide_sources: true };
        Ok(self.ask(question, opts, None).await?.text)
    }
}
