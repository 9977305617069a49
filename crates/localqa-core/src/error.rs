use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any backend is called (bad k, empty query).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out: no token within {0:?}")]
    GenerationTimeout(Duration),

    /// Query vectors and stored vectors come from different embedding models.
    #[error("Embedding dimension mismatch: index stores {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
