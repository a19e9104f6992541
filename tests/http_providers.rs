//! Wire-level tests for the embedding and completion HTTP clients against a
//! mock server.

use httpmock::prelude::*;
use serde_json::json;

use ragloom::completion::{CompletionClient, HttpCompletionClient};
use ragloom::config::ModelServiceConfig;
use ragloom::embedder::{EmbeddingProvider, HttpEmbeddingProvider};
use ragloom::error::RagError;

fn config(server: &MockServer) -> ModelServiceConfig {
    ModelServiceConfig::new(server.base_url(), "test-key", "test-model")
}

#[tokio::test]
async fn embeddings_are_parsed_in_request_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model": "test-model", "input": ["alpha", "beta"]}"#);
            then.status(200).json_body(json!({
                "data": [
                    { "embedding": [1.0, 0.0, 0.0] },
                    { "embedding": [0.0, 1.0, 0.0] }
                ]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(reqwest::Client::new(), config(&server), 3);
    let texts = vec!["alpha".to_string(), "beta".to_string()];
    let embeddings = provider.embed_many(&texts).await.unwrap();

    mock.assert_async().await;
    assert_eq!(embeddings, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn embedding_dimension_disagreement_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(json!({
                "data": [{ "embedding": [0.5, 0.5] }]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(reqwest::Client::new(), config(&server), 3);
    let err = provider.embed("anything").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService(_)));
    assert!(err.to_string().contains("dimension 2"));
}

#[tokio::test]
async fn embedding_service_error_surfaces_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(429).body("quota exhausted");
        })
        .await;

    let provider = HttpEmbeddingProvider::new(reqwest::Client::new(), config(&server), 3);
    let err = provider.embed("anything").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("429"));
    assert!(message.contains("quota exhausted"));
}

#[tokio::test]
async fn short_embedding_batches_are_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(json!({
                "data": [{ "embedding": [1.0, 0.0, 0.0] }]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(reqwest::Client::new(), config(&server), 3);
    let texts = vec!["alpha".to_string(), "beta".to_string()];
    let err = provider.embed_many(&texts).await.unwrap_err();
    assert!(err.to_string().contains("requested 2"));
}

#[tokio::test]
async fn completion_sends_system_and_user_messages() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_partial(
                    r#"{
                        "messages": [
                            { "role": "system", "content": "grounding context" },
                            { "role": "user", "content": "the question" }
                        ]
                    }"#,
                );
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "content": "the answer" } }
                ]
            }));
        })
        .await;

    let client = HttpCompletionClient::new(reqwest::Client::new(), config(&server));
    let answer = client
        .complete("grounding context", "the question")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(answer, "the answer");
}

#[tokio::test]
async fn completion_without_choices_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        })
        .await;

    let client = HttpCompletionClient::new(reqwest::Client::new(), config(&server));
    let err = client.complete("ctx", "q").await.unwrap_err();
    assert!(matches!(err, RagError::CompletionService(_)));
    assert!(err.to_string().contains("no choices"));
}

#[tokio::test]
async fn completion_service_error_is_typed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(503).body("upstream overloaded");
        })
        .await;

    let client = HttpCompletionClient::new(reqwest::Client::new(), config(&server));
    let err = client.complete("ctx", "q").await.unwrap_err();
    assert!(matches!(err, RagError::CompletionService(_)));
    assert!(err.to_string().contains("503"));
}
