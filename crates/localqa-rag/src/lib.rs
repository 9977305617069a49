//! localqa-rag
//!
//! Retrieval-augmented answering: the retriever, the stuffing prompt
//! assembler and the query service that runs them in order.

mod prompt;
mod retriever;
mod service;

pub use prompt::{PromptAssembler, CONTEXT_INSTRUCTIONS, NO_CONTEXT_INSTRUCTIONS};
pub use retriever::Retriever;
pub use service::{AskOptions, QueryService};
