use localqa_core::traits::VectorIndex;
use localqa_core::types::{ChunkSource, DocumentChunk, Metric};
use localqa_core::Error;
use localqa_vector::{LanceIndex, LanceIndexWriter};
use tempfile::TempDir;

const TABLE: &str = "documents_test_tmp";

fn chunk(id: &str, path: &str, embedding: Vec<f32>) -> DocumentChunk {
    DocumentChunk {
        id: id.to_string(),
        text: format!("content of {id}"),
        embedding,
        source: ChunkSource { path: path.to_string(), chunk_index: 0 },
    }
}

async fn seeded() -> (TempDir, LanceIndex) {
    let tmp = TempDir::new().expect("tmp");
    let writer = LanceIndexWriter::open(tmp.path(), TABLE).await.expect("writer");
    let written = writer
        .append(&[
            chunk("fire", "notes/fire.txt", vec![1.0, 0.0, 0.0]),
            chunk("water", "notes/water.txt", vec![0.0, 1.0, 0.0]),
            chunk("smoke", "notes/fire.txt", vec![0.8, 0.2, 0.0]),
        ])
        .await
        .expect("append");
    assert_eq!(written, 3);
    let index = LanceIndex::open(tmp.path(), TABLE).await.expect("index");
    (tmp, index)
}

#[tokio::test]
async fn search_returns_sorted_hits_that_resolve_to_chunks() {
    let (_tmp, index) = seeded().await;
    assert_eq!(index.count().await.unwrap(), 3);

    let hits = index.query(&[1.0, 0.0, 0.0], 2, Metric::Cosine).await.expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "fire");
    assert_eq!(hits[1].id, "smoke");
    assert!(hits[0].score >= hits[1].score);

    let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
    let chunks = index.chunks(&ids).await.expect("chunks");
    assert_eq!(chunks[0].text, "content of fire");
    assert_eq!(chunks[0].source.path, "notes/fire.txt");
    assert_eq!(chunks[0].embedding, vec![1.0, 0.0, 0.0]);
}

#[tokio::test]
async fn k_larger_than_table_returns_everything() {
    let (_tmp, index) = seeded().await;
    let hits = index.query(&[0.0, 1.0, 0.0], 50, Metric::L2).await.expect("query");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "water");
}

#[tokio::test]
async fn missing_table_means_no_matches() {
    let tmp = TempDir::new().expect("tmp");
    let index = LanceIndex::open(tmp.path(), TABLE).await.expect("index");
    assert!(index.query(&[1.0, 0.0], 4, Metric::Cosine).await.unwrap().is_empty());
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_directory_is_unavailable() {
    let tmp = TempDir::new().expect("tmp");
    let err = LanceIndex::open(&tmp.path().join("nope"), TABLE).await.err().expect("should fail");
    assert!(matches!(err, Error::IndexUnavailable(_)));
}

#[tokio::test]
async fn wrong_query_dimension_is_reported() {
    let (_tmp, index) = seeded().await;
    let err = index.query(&[1.0, 0.0], 1, Metric::Cosine).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[tokio::test]
async fn appending_a_different_dimension_is_refused() {
    let (tmp, _index) = seeded().await;
    let writer = LanceIndexWriter::open(tmp.path(), TABLE).await.expect("writer");
    let err = writer.append(&[chunk("x", "x.txt", vec![1.0, 0.0])]).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[tokio::test]
async fn unknown_chunk_id_is_unavailable() {
    let (_tmp, index) = seeded().await;
    let err = index.chunks(&["ghost".to_string()]).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
}

#[tokio::test]
async fn search_returns_full_records_with_scores() {
    let (_tmp, index) = seeded().await;
    let found = index.search(&[1.0, 0.0, 0.0], 2, Metric::Cosine).await.expect("search");
    let got: Vec<(&str, &str)> = found.iter().map(|s| (s.chunk.id.as_str(), s.chunk.text.as_str())).collect();
    assert_eq!(got, [("fire", "content of fire"), ("smoke", "content of smoke")]);
    let top = found.iter().next().expect("top");
    assert!((top.score - 1.0).abs() < 1e-5);
    assert_eq!(top.chunk.source.path, "notes/fire.txt");
}

#[tokio::test]
async fn many_equal_scores_still_break_ties_by_id() {
    let tmp = TempDir::new().expect("tmp");
    let writer = LanceIndexWriter::open(tmp.path(), TABLE).await.expect("writer");
    let identical: Vec<DocumentChunk> =
        (0..40).rev().map(|i| chunk(&format!("c{i:02}"), "same.txt", vec![0.5, 0.5, 0.0])).collect();
    writer.append(&identical).await.expect("append");
    let index = LanceIndex::open(tmp.path(), TABLE).await.expect("index");

    let hits = index.query(&[1.0, 0.0, 0.0], 4, Metric::Cosine).await.expect("query");
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["c00", "c01", "c02", "c03"]);
}
