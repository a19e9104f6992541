//! Client boundary for the answer-generation service.
//!
//! The core treats completion as an opaque, possibly slow, possibly failing
//! remote call. The HTTP client targets an OpenAI-compatible
//! `/chat/completions` endpoint, as used by the Gemini compatibility layer.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelServiceConfig;
use crate::error::{RagError, Result};

/// Generates an answer from an assembled context and the user query.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `system_context` and `user_query` to the model, returning the
    /// answer text. Upstream failures (rate limits, network, malformed
    /// responses) surface as [`RagError::CompletionService`].
    async fn complete(&self, system_context: &str, user_query: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
#[derive(Clone, Debug)]
pub struct HttpCompletionClient {
    client: Client,
    config: ModelServiceConfig,
}

impl HttpCompletionClient {
    pub fn new(client: Client, config: ModelServiceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, system_context: &str, user_query: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_context,
                },
                ChatMessage {
                    role: "user",
                    content: user_query,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::CompletionService(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::CompletionService(format!(
                "{url} returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| RagError::CompletionService(err.to_string()))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                RagError::CompletionService("response contained no choices".to_string())
            })?;
        debug!(chars = answer.len(), "completion received");
        Ok(answer)
    }
}

/// Test double that always answers with a fixed string.
#[derive(Clone, Debug)]
pub struct StaticCompletionClient {
    answer: String,
}

impl StaticCompletionClient {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for StaticCompletionClient {
    async fn complete(&self, _system_context: &str, _user_query: &str) -> Result<String> {
        Ok(self.answer.clone())
    }
}
