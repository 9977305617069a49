use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use localqa_core::types::DocumentChunk;
use localqa_core::{Error, Result};

use crate::schema::{build_chunk_schema, vector_dim};
use crate::table::{index_err, table_exists};

/// Appends pre-embedded chunks to a LanceDB table.
///
/// This is the hand-off point for ingestion tooling: chunking and embedding
/// happen elsewhere. Each `append` is a single Lance commit, so readers see
/// either none or all of a batch.
pub struct LanceIndexWriter {
    db: Connection,
    table_name: String,
}

impl LanceIndexWriter {
    /// Opens (creating if needed) the persist directory.
    pub async fn open(persist_directory: &Path, table_name: &str) -> Result<Self> {
        std::fs::create_dir_all(persist_directory).map_err(index_err)?;
        let db = connect(&persist_directory.to_string_lossy()).execute().await.map_err(index_err)?;
        Ok(Self { db, table_name: table_name.to_string() })
    }

    pub async fn append(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let Some(first) = chunks.first() else { return Ok(0) };
        let dim = first.embedding.len();
        if dim == 0 { return Err(Error::InvalidArgument(format!("chunk '{}' has an empty embedding", first.id))); }
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.embedding.len() });
        }

        let exists = table_exists(&self.db, &self.table_name).await?;
        if exists {
            let table = self.db.open_table(&self.table_name).execute().await.map_err(index_err)?;
            let stored = vector_dim(&table.schema().await.map_err(index_err)?);
            if let Some(expected) = stored.filter(|d| *d != dim) {
                return Err(Error::DimensionMismatch { expected, actual: dim });
            }
        }

        let batch = chunks_to_record_batch(chunks, dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if exists {
            self.db.open_table(&self.table_name).execute().await.map_err(index_err)?
                .add(reader).execute().await.map_err(index_err)?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await.map_err(index_err)?;
        }
        info!(chunks = chunks.len(), table = %self.table_name, "appended chunks");
        Ok(chunks.len())
    }
}

fn chunks_to_record_batch(chunks: &[DocumentChunk], dim: usize) -> Result<RecordBatch> {
    let width = i32::try_from(dim).map_err(index_err)?;
    let mut ids = Vec::with_capacity(chunks.len());
    let mut contents = Vec::with_capacity(chunks.len());
    let mut paths = Vec::with_capacity(chunks.len());
    let mut indices = Vec::with_capacity(chunks.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
    for c in chunks {
        ids.push(c.id.clone());
        contents.push(c.text.clone());
        paths.push(c.source.path.clone());
        indices.push(i32::try_from(c.source.chunk_index).map_err(index_err)?);
        vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(
        build_chunk_schema(width),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(paths)),
            Arc::new(Int32Array::from(indices)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), width)),
        ],
    )
    .map_err(index_err)
}
