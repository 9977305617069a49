use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use localqa_core::traits::VectorIndex;
use localqa_core::types::{rank_order, ChunkId, DocumentChunk, Metric, RetrievalResult, ScoredChunk};
use localqa_core::{Error, Result};

use crate::schema::{vector_dim, DISTANCE_COL, ID_COL};
use crate::table::{chunks_from_batch, f32_col, index_err, open_db, table_exists};

/// Extra candidates fetched up front so most ties at the k-th position
/// resolve by id without a second search.
const TIE_OVERFETCH: usize = 8;

pub(crate) fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::Cosine => DistanceType::Cosine,
        Metric::L2 => DistanceType::L2,
        Metric::Dot => DistanceType::Dot,
    }
}

/// Convert a Lance distance into a score where higher is better.
pub(crate) fn score_from_distance(metric: Metric, distance: f32) -> f32 {
    match metric {
        Metric::Cosine | Metric::Dot => 1.0 - distance,
        Metric::L2 => -distance,
    }
}

/// Read-only view over a LanceDB chunk table.
///
/// The table is re-opened and pinned to its latest committed version per
/// search; Lance commits are atomic, so a concurrent writer never exposes a
/// partially written batch.
pub struct LanceIndex {
    db: Connection,
    table_name: String,
}

impl LanceIndex {
    pub async fn open(persist_directory: &Path, table_name: &str) -> Result<Self> {
        let db = open_db(persist_directory).await?;
        debug!(dir = %persist_directory.display(), table = table_name, "opened lance index");
        Ok(Self { db, table_name: table_name.to_string() })
    }

    /// Number of stored chunks; zero when the table has not been created yet.
    pub async fn count(&self) -> Result<usize> {
        if !table_exists(&self.db, &self.table_name).await? { return Ok(0); }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(index_err)?;
        table.count_rows(None).await.map_err(index_err)
    }
}

/// One flat vector search returning every column of the `limit` nearest rows.
async fn fetch_nearest(table: &Table, vector: &[f32], metric: Metric, limit: usize) -> Result<Vec<ScoredChunk>> {
    let mut stream = table
        .vector_search(vector.to_vec())
        .map_err(index_err)?
        .distance_type(distance_type(metric))
        .limit(limit)
        .execute()
        .await
        .map_err(index_err)?;

    let mut found = Vec::with_capacity(limit);
    while let Some(batch) = stream.try_next().await.map_err(index_err)? {
        let distances = f32_col(&batch, DISTANCE_COL)?;
        for (i, chunk) in chunks_from_batch(&batch)?.into_iter().enumerate() {
            found.push(ScoredChunk { chunk, score: score_from_distance(metric, distances.value(i)) });
        }
    }
    found.sort_by(|a, b| rank_order(a.score, &a.chunk.id, b.score, &b.chunk.id));
    Ok(found)
}

/// True when rows beyond the fetched ones could still tie with the k-th hit.
fn tie_reaches_tail(ranked: &[ScoredChunk], k: usize) -> bool {
    match (ranked.get(k - 1), ranked.last()) {
        (Some(kth), Some(last)) if ranked.len() > k => !(last.score < kth.score),
        _ => false,
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn search(&self, vector: &[f32], k: usize, metric: Metric) -> Result<RetrievalResult> {
        if k == 0 { return Err(Error::InvalidArgument("k must be >= 1".to_string())); }
        if !table_exists(&self.db, &self.table_name).await? {
            debug!(table = %self.table_name, "table not created yet; no matches");
            return Ok(RetrievalResult::empty());
        }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(index_err)?;
        // Pin the current commit so every read below sees the same rows.
        let version = table.version().await.map_err(index_err)?;
        table.checkout(version).await.map_err(index_err)?;

        let schema = table.schema().await.map_err(index_err)?;
        let expected = vector_dim(&schema)
            .ok_or_else(|| Error::IndexUnavailable(format!("table '{}' has no vector column", self.table_name)))?;
        if expected != vector.len() {
            return Err(Error::DimensionMismatch { expected, actual: vector.len() });
        }
        let rows = table.count_rows(None).await.map_err(index_err)?;
        if rows == 0 { return Ok(RetrievalResult::empty()); }

        // Lance returns equal-distance rows in no fixed order; widen the fetch
        // until the tail scores strictly below the k-th hit.
        let mut limit = (k + TIE_OVERFETCH).min(rows);
        loop {
            let ranked = fetch_nearest(&table, vector, metric, limit).await?;
            if limit >= rows || ranked.len() < limit || !tie_reaches_tail(&ranked, k) {
                let result = RetrievalResult::ranked(ranked, k);
                debug!(found = result.len(), k, fetched = limit, version, %metric, "lance vector search");
                return Ok(result);
            }
            limit = limit.saturating_mul(2).min(rows);
        }
    }

    async fn chunks(&self, ids: &[ChunkId]) -> Result<Vec<DocumentChunk>> {
        if ids.is_empty() { return Ok(Vec::new()); }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(index_err)?;
        let list = ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>().join(",");
        let mut stream = table
            .query()
            .only_if(format!("{ID_COL} IN ({list})"))
            .execute()
            .await
            .map_err(index_err)?;

        let mut by_id: HashMap<ChunkId, DocumentChunk> = HashMap::with_capacity(ids.len());
        while let Some(batch) = stream.try_next().await.map_err(index_err)? {
            for chunk in chunks_from_batch(&batch)? {
                by_id.insert(chunk.id.clone(), chunk);
            }
        }
        ids.iter()
            .map(|id| by_id.remove(id).ok_or_else(|| Error::IndexUnavailable(format!("chunk '{id}' is missing from table '{}'", self.table_name))))
            .collect()
    }
}
