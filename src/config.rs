//! Explicit configuration passed to each component at construction.
//!
//! Nothing in this crate reads global mutable state; every collaborator gets
//! its parameters injected so tests can swap in deterministic doubles.

use std::time::Duration;

use crate::error::{RagError, Result};

/// Character-based chunking parameters.
///
/// Defaults mirror the ingestion pass this pipeline was built for:
/// 1000-character chunks with a 400-character overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks. Must be < `chunk_size`.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 400,
        }
    }
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects invalid parameters before any document is touched.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be positive".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Budget for the assembled prompt context.
#[derive(Clone, Copy, Debug)]
pub struct ContextConfig {
    /// Maximum total characters of rendered context.
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_chars: 8000 }
    }
}

/// Queue and worker-pool tuning.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Number of concurrent worker tasks.
    pub workers: usize,
    /// How long a worker sleeps between claim attempts when idle.
    pub poll_interval: Duration,
    /// A RUNNING job whose `updated_at` is older than this is eligible for
    /// reclaim by another worker (stale-owner recovery).
    pub visibility_timeout: Duration,
    /// How many chunks to retrieve per query.
    pub top_k: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_interval: Duration::from_millis(500),
            visibility_timeout: Duration::from_secs(300),
            top_k: 4,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

/// Connection details for the remote model services.
#[derive(Clone, Debug)]
pub struct ModelServiceConfig {
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// Bearer token sent with each request.
    pub api_key: String,
    /// Model identifier passed in request bodies.
    pub model: String,
}

impl ModelServiceConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Resolves completion-service settings from the environment.
    ///
    /// Reads `.env` via dotenvy, then `RAGLOOM_API_BASE`, `RAGLOOM_API_KEY`,
    /// and `RAGLOOM_COMPLETION_MODEL`.
    pub fn completion_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("RAGLOOM_API_BASE").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });
        let api_key = std::env::var("RAGLOOM_API_KEY")
            .map_err(|_| RagError::Configuration("RAGLOOM_API_KEY is not set".into()))?;
        let model = std::env::var("RAGLOOM_COMPLETION_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        Ok(Self::new(base_url, api_key, model))
    }

    /// Resolves embedding-service settings from the environment.
    ///
    /// Shares `RAGLOOM_API_BASE`/`RAGLOOM_API_KEY` with the completion
    /// service; the model comes from `RAGLOOM_EMBEDDING_MODEL`.
    pub fn embedding_from_env() -> Result<Self> {
        let mut config = Self::completion_from_env()?;
        config.model = std::env::var("RAGLOOM_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-004".to_string());
        Ok(config)
    }
}

/// Resolves the SQLite database URL used by the index and job store.
pub fn database_url_from_env() -> String {
    dotenvy::dotenv().ok();
    std::env::var("RAGLOOM_DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://ragloom.db?mode=rwc".to_string())
}
