use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

pub const ID_COL: &str = "id";
pub const CONTENT_COL: &str = "content";
pub const DOC_PATH_COL: &str = "doc_path";
pub const CHUNK_INDEX_COL: &str = "chunk_index";
pub const VECTOR_COL: &str = "vector";
pub const DISTANCE_COL: &str = "_distance";

pub fn build_chunk_schema(dim: i32) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(ID_COL, DataType::Utf8, false),
        Field::new(CONTENT_COL, DataType::Utf8, false),
        Field::new(DOC_PATH_COL, DataType::Utf8, false),
        Field::new(CHUNK_INDEX_COL, DataType::Int32, false),
        Field::new(VECTOR_COL, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), false),
    ]))
}

/// Width of the fixed-size `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COL).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}
