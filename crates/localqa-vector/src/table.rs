//! LanceDB connection and column helpers.
//!
//! Every backend failure is reported as `IndexUnavailable` so callers see a
//! single error kind for "the persisted store cannot be read".

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray};
use lancedb::{connect, Connection};
use std::path::Path;

use localqa_core::types::{ChunkSource, DocumentChunk};
use localqa_core::{Error, Result};

use crate::schema::{CHUNK_INDEX_COL, CONTENT_COL, DOC_PATH_COL, ID_COL, VECTOR_COL};

pub(crate) fn index_err(e: impl std::fmt::Display) -> Error {
    Error::IndexUnavailable(e.to_string())
}

/// Connect to an existing persist directory. A missing directory is an error:
/// the query side never creates an index.
pub async fn open_db(path: &Path) -> Result<Connection> {
    if !path.is_dir() {
        return Err(Error::IndexUnavailable(format!("persist directory {} does not exist", path.display())));
    }
    connect(&path.to_string_lossy()).execute().await.map_err(index_err)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(index_err)?;
    Ok(names.iter().any(|n| n == name))
}

pub(crate) fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::IndexUnavailable(format!("column '{name}' missing or not utf8")))
}

pub(crate) fn f32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::IndexUnavailable(format!("column '{name}' missing or not float32")))
}

/// Decode every row of a chunk-table batch.
pub(crate) fn chunks_from_batch(batch: &RecordBatch) -> Result<Vec<DocumentChunk>> {
    let ids = string_col(batch, ID_COL)?;
    let contents = string_col(batch, CONTENT_COL)?;
    let paths = string_col(batch, DOC_PATH_COL)?;
    let indices = batch
        .column_by_name(CHUNK_INDEX_COL)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::IndexUnavailable(format!("column '{CHUNK_INDEX_COL}' missing or not int32")))?;
    let vectors = batch
        .column_by_name(VECTOR_COL)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| Error::IndexUnavailable(format!("column '{VECTOR_COL}' missing or not a fixed-size list")))?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if !vectors.is_valid(i) {
            return Err(Error::IndexUnavailable(format!("chunk '{}' has no vector", ids.value(i))));
        }
        let embedding = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
        out.push(DocumentChunk {
            id: ids.value(i).to_string(),
            text: contents.value(i).to_string(),
            embedding,
            source: ChunkSource {
                path: paths.value(i).to_string(),
                chunk_index: usize::try_from(indices.value(i)).map_err(index_err)?,
            },
        });
    }
    Ok(out)
}
