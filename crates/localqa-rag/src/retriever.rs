use std::sync::Arc;
use tracing::debug;

use localqa_core::traits::{Embedder, VectorIndex};
use localqa_core::types::{Metric, Query, RetrievalResult};
use localqa_core::{Error, Result};

/// Embeds a question and resolves its nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    metric: Metric,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, metric: Metric) -> Self {
        Self { embedder, index, metric }
    }

    /// Up to `k` chunks, best first. No matches is an empty result, not an error.
    pub async fn retrieve(&self, query_text: &str, k: usize) -> Result<RetrievalResult> {
        let query = Query::new(query_text, k)?;
        // Model inference is CPU bound; keep it off the async workers.
        let embedder = Arc::clone(&self.embedder);
        let text = query.text.clone();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {e}")))??;

        let result = self.index.search(&vector, query.k, self.metric).await?;
        if result.is_empty() {
            debug!(k = query.k, "no chunks matched");
        } else {
            debug!(k = query.k, found = result.len(), model = self.embedder.model_id(), "retrieved chunks");
        }
        Ok(result)
    }
}
