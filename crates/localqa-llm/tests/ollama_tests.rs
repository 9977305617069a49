use std::time::Duration;

use localqa_core::traits::{Generator, TokenSink};
use localqa_core::types::TruncationPolicy;
use localqa_core::Error;
use localqa_llm::{CannedGenerator, OllamaGenerator, PromptBudget};
use mockito::{Matcher, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn ndjson(tokens: &[&str]) -> String {
    let mut body = String::new();
    for t in tokens {
        body.push_str(&serde_json::json!({ "model": "mistral", "response": t, "done": false }).to_string());
        body.push('\n');
    }
    body.push_str(&serde_json::json!({ "model": "mistral", "response": "", "done": true }).to_string());
    body.push('\n');
    body
}

#[tokio::test]
async fn streamed_tokens_concatenate_to_the_answer() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(ndjson(&["The ", "capital ", "is ", "Paris."]))
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "mistral").unwrap();
    let mut seen: Vec<String> = Vec::new();
    let mut sink = |t: &str| seen.push(t.to_string());
    let answer = generator.generate("prompt", Some(&mut sink as TokenSink<'_>)).await.unwrap();

    assert_eq!(answer, "The capital is Paris.");
    assert_eq!(seen, ["The ", "capital ", "is ", "Paris."]);
    assert_eq!(seen.concat(), answer);
    mock.assert_async().await;
}

#[tokio::test]
async fn generation_completes_without_a_callback() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(ndjson(&["no ", "listener"]))
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "mistral").unwrap();
    assert_eq!(generator.generate("prompt", None).await.unwrap(), "no listener");
}

#[tokio::test]
async fn multibyte_tokens_arrive_intact() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(ndjson(&["Zürich ", "liegt ", "am ", "See. ", "東京"]))
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "mistral").unwrap();
    let answer = generator.generate("prompt", None).await.unwrap();
    assert_eq!(answer, "Zürich liegt am See. 東京");
    assert_eq!(answer.chars().count(), 23);
    assert!(answer.len() > answer.chars().count());
}

#[tokio::test]
async fn request_carries_model_prompt_and_context_window() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "llama3",
            "prompt": "Question: why?",
            "stream": true,
            "options": { "num_ctx": 4096 }
        })))
        .with_status(200)
        .with_body(ndjson(&["ok"]))
        .create_async()
        .await;

    let generator = OllamaGenerator::new(format!("{}/", server.url()), "llama3")
        .unwrap()
        .with_context_window(Some(4096));
    assert_eq!(generator.generate("Question: why?", None).await.unwrap(), "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn over_budget_prompt_loses_its_start() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(serde_json::json!({ "prompt": "Question: why?" })))
        .with_status(200)
        .with_body(ndjson(&["ok"]))
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "mistral")
        .unwrap()
        .with_budget(PromptBudget::new(Some(14), TruncationPolicy::TruncateStart));
    generator.generate("lots of context. Question: why?", None).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_status_is_a_generation_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(404)
        .with_body(r#"{"error":"model 'mistral' not found"}"#)
        .create_async()
        .await;

    let generator = OllamaGenerator::new(server.url(), "mistral").unwrap();
    let err = generator.generate("prompt", None).await.unwrap_err();
    match err {
        Error::GenerationFailed(msg) => assert!(msg.contains("not found"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_line_mid_stream_is_a_generation_failure() {
    let mut server = Server::new_async().await;
    let body = format!(
        "{}\n{}\n",
        serde_json::json!({ "response": "partial ", "done": false }),
        serde_json::json!({ "error": "out of memory" })
    );
    let _mock = server.mock("POST", "/api/generate").with_status(200).with_body(body).create_async().await;

    let generator = OllamaGenerator::new(server.url(), "mistral").unwrap();
    let mut seen = String::new();
    let mut sink = |t: &str| seen.push_str(t);
    let err = generator.generate("prompt", Some(&mut sink as TokenSink<'_>)).await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailed(ref m) if m == "out of memory"));
    assert_eq!(seen, "partial ");
}

#[tokio::test]
async fn stream_without_done_marker_is_a_failure() {
    let mut server = Server::new_async().await;
    let body = format!("{}\n", serde_json::json!({ "response": "cut", "done": false }));
    let _mock = server.mock("POST", "/api/generate").with_status(200).with_body(body).create_async().await;

    let generator = OllamaGenerator::new(server.url(), "mistral").unwrap();
    let err = generator.generate("prompt", None).await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailed(_)));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let generator = OllamaGenerator::new(format!("http://{addr}"), "mistral")
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let err = generator.generate("prompt", None).await.unwrap_err();
    assert!(matches!(err, Error::GenerationTimeout(d) if d == Duration::from_millis(200)));
    server.abort();
}

#[tokio::test]
async fn stall_after_first_token_times_out_and_keeps_delivered_tokens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let line = format!("{}\n", serde_json::json!({ "response": "Hel", "done": false }));
        let head = "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n";
        let chunk = format!("{:x}\r\n{}\r\n", line.len(), line);
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let generator = OllamaGenerator::new(format!("http://{addr}"), "mistral")
        .unwrap()
        .with_timeout(Duration::from_millis(300));
    let mut seen = Vec::new();
    let mut sink = |t: &str| seen.push(t.to_string());
    let err = generator.generate("prompt", Some(&mut sink as TokenSink<'_>)).await.unwrap_err();
    assert!(matches!(err, Error::GenerationTimeout(_)));
    assert_eq!(seen, ["Hel"]);
    server.abort();
}

#[tokio::test]
async fn refused_connection_is_a_generation_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let generator = OllamaGenerator::new(format!("http://{addr}"), "mistral").unwrap();
    let err = generator.generate("prompt", None).await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailed(_)));
}

#[tokio::test]
async fn empty_endpoint_is_a_config_error() {
    assert!(matches!(OllamaGenerator::new("  ", "mistral"), Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn canned_generator_streams_words_and_records_prompts() {
    let generator = CannedGenerator::new("one two three");
    let mut seen = Vec::new();
    let mut sink = |t: &str| seen.push(t.to_string());
    let answer = generator.generate("the prompt", Some(&mut sink as TokenSink<'_>)).await.unwrap();
    assert_eq!(seen, ["one ", "two ", "three"]);
    assert_eq!(seen.concat(), answer);
    assert_eq!(generator.prompts(), ["the prompt"]);
}
