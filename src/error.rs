//! Error taxonomy shared across the pipeline.
//!
//! Components raise typed failures and let callers decide policy. The only
//! place that converts errors into state instead of propagating them is the
//! worker loop, which records embedder/completion failures on the job rather
//! than crashing (see [`crate::queue::worker`]).

use miette::Diagnostic;
use thiserror::Error;

use crate::queue::JobId;

/// Errors produced by the ingestion and query pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum RagError {
    /// Invalid construction-time parameters, rejected before any processing.
    #[error("invalid configuration: {0}")]
    #[diagnostic(
        code(ragloom::configuration),
        help("Check chunk sizes, overlaps, and other constructor parameters.")
    )]
    Configuration(String),

    /// An embedding's dimension does not match the index's fixed dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(ragloom::index::dimension_mismatch),
        help("Ingestion-time and query-time embeddings must use the same model configuration.")
    )]
    DimensionMismatch { expected: usize, actual: usize },

    /// Upstream embedding service failure (network, model, malformed body).
    #[error("embedding service error: {0}")]
    #[diagnostic(code(ragloom::embedder::upstream))]
    EmbeddingService(String),

    /// Upstream completion service failure (rate limits, network, malformed body).
    #[error("completion service error: {0}")]
    #[diagnostic(code(ragloom::completion::upstream))]
    CompletionService(String),

    /// Status lookup for a job id that was never submitted.
    #[error("job not found: {0}")]
    #[diagnostic(
        code(ragloom::queue::not_found),
        help("The job id is unknown; it may belong to a different store.")
    )]
    JobNotFound(JobId),

    /// Storage backend failure (SQLite, pool, migration).
    #[error("storage error: {0}")]
    #[diagnostic(code(ragloom::storage))]
    Storage(String),

    /// Filesystem error while reading documents to ingest.
    #[error(transparent)]
    #[diagnostic(code(ragloom::io))]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(ragloom::serde_json))]
    Serde(#[from] serde_json::Error),
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
