use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkId, DocumentChunk, IndexHit, Metric, RetrievalResult};

/// Callback receiving each generated token as soon as it is produced.
pub type TokenSink<'a> = &'a mut (dyn FnMut(&str) + Send);

pub trait Embedder: Send + Sync {
    /// Stable identifier of the model, e.g. `candle:all-MiniLM-L6-v2:d384`.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Maximum number of tokens considered; longer input is truncated.
    fn max_len(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Read side of a persisted chunk store.
///
/// Every call observes one committed state of the store; a concurrent writer
/// never exposes a partially written chunk.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` nearest chunks with their scores, ranked, all read from one
    /// committed state of the store.
    async fn search(&self, vector: &[f32], k: usize, metric: Metric) -> Result<RetrievalResult>;

    /// Up to `k` nearest chunk ids with their scores (higher is better).
    async fn query(&self, vector: &[f32], k: usize, metric: Metric) -> Result<Vec<IndexHit>> {
        let found = self.search(vector, k, metric).await?;
        Ok(found.iter().map(|s| IndexHit { id: s.chunk.id.clone(), score: s.score }).collect())
    }

    /// Full records for `ids`, in the order requested.
    async fn chunks(&self, ids: &[ChunkId]) -> Result<Vec<DocumentChunk>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Streams an answer for `prompt`, calling `on_token` for every token in
    /// emission order. The returned text is the concatenation of all tokens.
    async fn generate(&self, prompt: &str, on_token: Option<TokenSink<'_>>) -> Result<String>;
}
