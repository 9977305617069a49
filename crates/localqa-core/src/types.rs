//! Domain types shared by the index, retriever, generator and query service.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Where a chunk came from inside the source document collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSource {
    pub path: String,
    pub chunk_index: usize,
}

/// A persisted span of source text together with its embedding.
///
/// - `id`: opaque identifier, unique within one index
/// - `text`: the passage handed to the generator
/// - `embedding`: vector of the index dimension `D`
/// - `source`: origin path and position within the parent document
///
/// Chunks are written by the ingestion tooling and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub source: ChunkSource,
}

/// Similarity metric used for nearest-neighbor search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::L2 => f.write_str("l2"),
            Self::Dot => f.write_str("dot"),
        }
    }
}

/// What to do when an assembled prompt is larger than `max_prompt_chars`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationPolicy {
    /// Send the prompt unchanged and let the model server apply its own limit.
    BackendDefined,
    /// Keep the tail of the prompt; the question is always at the end.
    #[default]
    TruncateStart,
    /// Drop the lowest-ranked retrieved chunks until the prompt fits.
    DropLowestRanked,
}

/// Raw nearest-neighbor match. Higher `score` is always better.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: ChunkId,
    pub score: f32,
}

/// Descending score, then ascending id. NaN scores sort last.
pub fn rank_order(a_score: f32, a_id: &str, b_score: f32, b_id: &str) -> Ordering {
    match (a_score.is_nan(), b_score.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b_score.total_cmp(&a_score).then_with(|| a_id.cmp(b_id)),
    }
}

/// Sort hits into rank order and keep at most `k`.
pub fn rank_hits(hits: &mut Vec<IndexHit>, k: usize) {
    hits.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
    hits.truncate(k);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Ranked retrieval output: length <= k, descending score, ties by ascending id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    items: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// Builds a result, sorting into rank order and truncating to `k`.
    pub fn ranked(mut items: Vec<ScoredChunk>, k: usize) -> Self {
        items.sort_by(|a, b| rank_order(a.score, &a.chunk.id, b.score, &b.chunk.id));
        items.truncate(k);
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ScoredChunk] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.items.iter()
    }

    /// Removes the lowest-ranked entry.
    pub fn pop_lowest(&mut self) -> Option<ScoredChunk> {
        self.items.pop()
    }

    pub fn into_chunks(self) -> Vec<DocumentChunk> {
        self.items.into_iter().map(|s| s.chunk).collect()
    }
}

/// A validated user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub k: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, k: usize) -> Result<Self> {
        let text = text.into();
        validate_k(k)?;
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument("query text is empty".to_string()));
        }
        Ok(Self { text, k })
    }
}

pub fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidArgument("k must be >= 1".to_string()));
    }
    Ok(())
}

/// Generated answer with the chunks that grounded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<DocumentChunk>,
}
