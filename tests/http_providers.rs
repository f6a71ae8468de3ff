//! HTTP collaborator clients against a mock server: request shapes, response
//! decoding, and error mapping.

use futures_util::StreamExt;
use httpmock::prelude::*;
use serde_json::json;

use paperchat::message::ChatMessage;
use paperchat::providers::{
    CompletionProvider, DocumentStore, EmbedError, EmbeddingProvider, FetchError,
    HttpCompletionProvider, HttpDocumentStore, HttpEmbeddingProvider, HttpTextExtractor,
    TextExtractor,
};

#[tokio::test]
async fn embedding_provider_decodes_batch_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .json_body_partial(r#"{"model": "embed-small"}"#);
            then.status(200).json_body(json!({
                "data": [
                    { "embedding": [0.1, 0.2] },
                    { "embedding": [0.3, 0.4] },
                ]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(server.base_url(), "embed-small");
    let vectors = provider
        .embed_batch(&["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

#[tokio::test]
async fn embedding_provider_rejects_short_batches() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200)
                .json_body(json!({ "data": [ { "embedding": [0.5] } ] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(server.base_url(), "embed-small");
    let err = provider
        .embed_batch(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EmbedError::ShapeMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn embedding_provider_surfaces_server_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(429).body("rate limited");
        })
        .await;

    let provider = HttpEmbeddingProvider::new(server.base_url(), "embed-small");
    let err = provider.embed_batch(&["a".to_string()]).await.unwrap_err();
    assert!(matches!(err, EmbedError::Provider { status: 429, .. }));
}

#[tokio::test]
async fn completion_provider_streams_sse_tokens_until_done() {
    let server = MockServer::start_async().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{}}]}\n\n",
        "data: [DONE]\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
    );
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        })
        .await;

    let provider = HttpCompletionProvider::new(server.base_url(), "chat-small");
    let mut stream = provider
        .stream_chat(&[ChatMessage::user("hi")])
        .await
        .unwrap();

    let mut collected = String::new();
    while let Some(token) = stream.next().await {
        collected.push_str(&token.unwrap());
    }
    assert_eq!(collected, "Hello", "tokens after [DONE] are ignored");
}

#[tokio::test]
async fn completion_provider_surfaces_http_errors_before_streaming() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("upstream exploded");
        })
        .await;

    let provider = HttpCompletionProvider::new(server.base_url(), "chat-small");
    let err = provider
        .stream_chat(&[ChatMessage::user("hi")])
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        paperchat::providers::CompletionError::Provider { status: 500, .. }
    ));
}

#[tokio::test]
async fn document_store_fetches_bytes_and_maps_missing_ids() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/2401.01234");
            then.status(200).body("raw pdf bytes");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/0000.00000");
            then.status(404);
        })
        .await;

    let store = HttpDocumentStore::new(server.base_url());
    let bytes = store.fetch("2401.01234").await.unwrap();
    assert_eq!(bytes, b"raw pdf bytes");

    let err = store.fetch("0000.00000").await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }));
}

#[tokio::test]
async fn text_extractor_posts_bytes_and_reads_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/extract");
            then.status(200).json_body(json!({ "text": "extracted body" }));
        })
        .await;

    let extractor = HttpTextExtractor::new(server.base_url());
    let text = extractor.extract(b"%PDF-1.7 ...").await.unwrap();

    mock.assert_async().await;
    assert_eq!(text, "extracted body");
}
