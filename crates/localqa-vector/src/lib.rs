//! localqa-vector
//!
//! Read access to the persisted chunk store (LanceDB), the write hand-off used
//! by ingestion tooling, and an in-memory index for tests.

use std::sync::Arc;

use localqa_core::traits::VectorIndex;
use localqa_core::{Result, Settings};
use tracing::info;

mod memory;
pub mod schema;
mod search;
mod table;
mod writer;

pub use memory::{similarity, MemoryIndex};
pub use search::LanceIndex;
pub use writer::LanceIndexWriter;

/// Open the persisted index named by `settings`.
pub async fn open_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    let index = LanceIndex::open(&settings.persist_directory, &settings.table_name).await?;
    info!(dir = %settings.persist_directory.display(), table = %settings.table_name, "vector index ready");
    Ok(Arc::new(index))
}
