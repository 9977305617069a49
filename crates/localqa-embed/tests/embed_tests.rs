use localqa_core::traits::Embedder;
use localqa_core::{Error, Settings};
use localqa_embed::{load_embedder, HashEmbedder, FAKE_EMBEDDING_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = Settings { use_fake_embeddings: true, ..Settings::default() };
    let embedder = load_embedder(&settings).expect("embedder");
    let v1 = embedder.embed("hello world").expect("embed");
    let v2 = embedder.embed("hello world").expect("embed");

    assert_eq!(v1.len(), FAKE_EMBEDDING_DIM, "embedding dim is {FAKE_EMBEDDING_DIM}");
    assert_eq!(embedder.dim(), FAKE_EMBEDDING_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    assert_eq!(v1, v2, "bit-identical for the same input");
}

#[test]
fn shared_words_score_higher() {
    let embedder = HashEmbedder::new(256);
    let q = embedder.embed("What is the capital of France?").expect("embed");
    let near = embedder.embed("Paris is the capital of France").expect("embed");
    let far = embedder.embed("Bananas grow in tropical climates").expect("embed");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn punctuation_and_case_are_ignored() {
    let embedder = HashEmbedder::new(64);
    let a = embedder.embed("France?").expect("embed");
    let b = embedder.embed("france").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn empty_text_yields_zero_vector() {
    let embedder = HashEmbedder::new(8);
    let v = embedder.embed("  ").expect("embed");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn missing_model_directory_is_embedding_unavailable() {
    let tmp = tempfile::tempdir().expect("tmp");
    let settings = Settings {
        embeddings_model_name: "no-such-model-xyz".to_string(),
        model_dir: Some(tmp.path().join("absent")),
        ..Settings::default()
    };
    match load_embedder(&settings) {
        Err(Error::EmbeddingUnavailable(msg)) => assert!(msg.contains("no-such-model-xyz")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected EmbeddingUnavailable"),
    }
}

#[test]
fn unreadable_model_files_are_embedding_unavailable() {
    let tmp = tempfile::tempdir().expect("tmp");
    std::fs::write(tmp.path().join("config.json"), r#"{"hidden_size": 8, "model_type": "bert"}"#).expect("write");
    let settings = Settings {
        embeddings_model_name: "broken".to_string(),
        model_dir: Some(tmp.path().to_path_buf()),
        ..Settings::default()
    };
    assert!(matches!(load_embedder(&settings), Err(Error::EmbeddingUnavailable(_))));
}
