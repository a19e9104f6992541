//! Text-to-vector encoding behind a swappable provider trait.
//!
//! The HTTP provider targets an OpenAI-compatible `/embeddings` endpoint;
//! the hash provider is a deterministic, offline stand-in used by tests and
//! local development.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelServiceConfig;
use crate::error::{RagError, Result};

/// Fixed-dimension numeric vector representation of a text.
pub type Embedding = Vec<f32>;

/// Maps text to fixed-length vectors.
///
/// Implementations must be deterministic for a fixed model configuration and
/// must preserve input order in [`EmbeddingProvider::embed_many`]. Upstream
/// failures surface as [`RagError::EmbeddingService`]; retry policy belongs
/// to the caller.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encodes a single text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Encodes a batch, preserving input order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Dimension of every vector this provider produces.
    fn dimensions(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Deserialize)]
struct EmbeddingsDatum {
    embedding: Vec<f32>,
}

/// Provider backed by an OpenAI-compatible embeddings endpoint.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: Client,
    config: ModelServiceConfig,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    /// `dimensions` is the deployment-wide embedding dimension; responses
    /// that disagree with it are rejected rather than silently stored.
    pub fn new(client: Client, config: ModelServiceConfig, dimensions: usize) -> Self {
        Self {
            client,
            config,
            dimensions,
        }
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Embedding>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingsRequest {
            model: &self.config.model,
            input,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::EmbeddingService(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingService(format!(
                "{url} returned {status}: {detail}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| RagError::EmbeddingService(err.to_string()))?;

        if parsed.data.len() != input.len() {
            return Err(RagError::EmbeddingService(format!(
                "requested {} embeddings, received {}",
                input.len(),
                parsed.data.len()
            )));
        }

        let mut embeddings = Vec::with_capacity(parsed.data.len());
        for datum in parsed.data {
            if datum.embedding.len() != self.dimensions {
                return Err(RagError::EmbeddingService(format!(
                    "service returned dimension {}, expected {}",
                    datum.embedding.len(),
                    self.dimensions
                )));
            }
            embeddings.push(datum.embedding);
        }
        debug!(count = embeddings.len(), "embedded batch");
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let input = vec![text.to_string()];
        let mut batch = self.request(&input).await?;
        Ok(batch.remove(0))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic bag-of-tokens hashing provider.
///
/// Tokens are lowercased, hashed into `dimensions` buckets, and the bucket
/// counts are L2-normalised. Texts sharing vocabulary end up cosine-close,
/// which is enough for retrieval ordering in tests and demos without any
/// network dependency.
#[derive(Clone, Debug)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn encode(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % self.dimensions as u64) as usize;
            // Sign from a second hash bit keeps distinct vocabularies from
            // collapsing onto the same axis direction.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.encode(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
