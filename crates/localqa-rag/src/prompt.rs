//! "Stuff" prompt: every retrieved chunk verbatim, then the question.

use std::fmt::Write;

use localqa_core::types::RetrievalResult;

pub const CONTEXT_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

pub const NO_CONTEXT_INSTRUCTIONS: &str = "No documents matched this question. \
Answer it from your own knowledge. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self { Self }

    /// Builds the prompt. Chunks appear in result order under numbered
    /// `Context [n] (path):` headers; chunk text is copied as stored, whitespace
    /// included, and nothing is truncated.
    pub fn assemble(&self, query_text: &str, retrieved: &RetrievalResult) -> String {
        let mut prompt = String::new();
        if retrieved.is_empty() {
            prompt.push_str(NO_CONTEXT_INSTRUCTIONS);
            prompt.push_str("\n\n");
        } else {
            prompt.push_str(CONTEXT_INSTRUCTIONS);
            prompt.push_str("\n\n");
            for (i, scored) in retrieved.iter().enumerate() {
                let _ = write!(prompt, "Context [{}] ({}):\n{}\n\n", i + 1, scored.chunk.source.path, scored.chunk.text);
            }
        }
        let _ = write!(prompt, "Question: {}\nHelpful Answer:", query_text.trim());
        prompt
    }
}
