use std::borrow::Cow;

use localqa_core::types::TruncationPolicy;
use tracing::warn;

/// Character budget for prompts sent to the model server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptBudget {
    pub max_chars: Option<usize>,
    pub policy: TruncationPolicy,
}

impl PromptBudget {
    pub fn new(max_chars: Option<usize>, policy: TruncationPolicy) -> Self {
        Self { max_chars, policy }
    }

    pub fn fits(&self, prompt: &str) -> bool {
        match self.max_chars {
            Some(max) => prompt.chars().count() <= max,
            None => true,
        }
    }

    /// Applies `truncate-start`: keeps the last `max_chars` characters so the
    /// question at the end of the prompt survives. Other policies pass the
    /// prompt through untouched.
    pub fn apply<'a>(&self, prompt: &'a str) -> Cow<'a, str> {
        let Some(max) = self.max_chars else { return Cow::Borrowed(prompt) };
        if self.policy != TruncationPolicy::TruncateStart || self.fits(prompt) {
            return Cow::Borrowed(prompt);
        }
        let start = match max.checked_sub(1) {
            Some(n) => prompt.char_indices().rev().nth(n).map(|(i, _)| i).unwrap_or(0),
            None => prompt.len(),
        };
        warn!(max_chars = max, dropped_bytes = start, "prompt over budget; dropping its start");
        Cow::Owned(prompt[start..].to_string())
    }
}
