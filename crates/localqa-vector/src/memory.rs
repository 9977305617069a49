use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use localqa_core::traits::VectorIndex;
use localqa_core::types::{rank_hits, ChunkId, DocumentChunk, IndexHit, Metric, RetrievalResult, ScoredChunk};
use localqa_core::{Error, Result};

#[derive(Default)]
struct Snapshot {
    dim: Option<usize>,
    chunks: BTreeMap<ChunkId, Arc<DocumentChunk>>,
}

/// In-memory brute-force index.
///
/// Readers clone the current `Arc<Snapshot>` and work on it without holding
/// the lock; writers build a new snapshot and swap it in whole.
#[derive(Default)]
pub struct MemoryIndex {
    current: RwLock<Arc<Snapshot>>,
}

impl MemoryIndex {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunks(chunks: Vec<DocumentChunk>) -> Result<Self> {
        let index = Self::new();
        index.publish(chunks)?;
        Ok(index)
    }

    /// Insert or replace chunks by id, visible to readers all at once.
    pub fn publish(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let mut guard = self.current.write().map_err(|_| poisoned())?;
        let mut next = Snapshot { dim: guard.dim, chunks: guard.chunks.clone() };
        for chunk in chunks {
            let dim = chunk.embedding.len();
            match next.dim {
                Some(expected) if expected != dim => return Err(Error::DimensionMismatch { expected, actual: dim }),
                _ => next.dim = Some(dim),
            }
            next.chunks.insert(chunk.id.clone(), Arc::new(chunk));
        }
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.chunks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn snapshot(&self) -> Result<Arc<Snapshot>> {
        Ok(Arc::clone(&*self.current.read().map_err(|_| poisoned())?))
    }
}

fn poisoned() -> Error {
    Error::IndexUnavailable("memory index lock poisoned".to_string())
}

/// Similarity under `metric`; higher is better.
pub fn similarity(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        Metric::Dot => dot,
        Metric::Cosine => {
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
        }
        Metric::L2 => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>(),
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(&self, vector: &[f32], k: usize, metric: Metric) -> Result<RetrievalResult> {
        if k == 0 { return Err(Error::InvalidArgument("k must be >= 1".to_string())); }
        // Scores and records both come from this one snapshot.
        let snapshot = self.snapshot()?;
        if let Some(expected) = snapshot.dim.filter(|d| *d != vector.len()) {
            return Err(Error::DimensionMismatch { expected, actual: vector.len() });
        }
        let mut hits: Vec<IndexHit> = snapshot
            .chunks
            .values()
            .map(|c| IndexHit { id: c.id.clone(), score: similarity(metric, vector, &c.embedding) })
            .collect();
        rank_hits(&mut hits, k);
        let scored = hits
            .into_iter()
            .filter_map(|hit| {
                snapshot.chunks.get(&hit.id).map(|c| ScoredChunk { chunk: DocumentChunk::clone(c), score: hit.score })
            })
            .collect();
        Ok(RetrievalResult::ranked(scored, k))
    }

    async fn chunks(&self, ids: &[ChunkId]) -> Result<Vec<DocumentChunk>> {
        let snapshot = self.snapshot()?;
        ids.iter()
            .map(|id| {
                snapshot
                    .chunks
                    .get(id)
                    .map(|c| DocumentChunk::clone(c))
                    .ok_or_else(|| Error::IndexUnavailable(format!("chunk '{id}' not found")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_orthogonal_opposite() {
        let a = [1.0, 0.0, 0.0];
        assert!((similarity(Metric::Cosine, &a, &a) - 1.0).abs() < 1e-6);
        assert!(similarity(Metric::Cosine, &a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert!((similarity(Metric::Cosine, &a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero_under_cosine() {
        assert_eq!(similarity(Metric::Cosine, &[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn l2_prefers_closer_points() {
        let q = [0.0, 0.0];
        assert!(similarity(Metric::L2, &q, &[1.0, 0.0]) > similarity(Metric::L2, &q, &[3.0, 0.0]));
    }
}
