//! # Ragloom: Asynchronous RAG Query Pipeline
//!
//! Ragloom turns documents into an addressable, searchable chunk index and
//! answers queries against it asynchronously: submission returns a job id
//! immediately, a worker pool does the retrieval and generation off the
//! request path, and clients poll for the result.
//!
//! ## Data flow
//!
//! ```text
//! Ingestion (offline):
//!   Document ──► chunker ──► embedder ──► index (append-only, persistent)
//!
//! Query (asynchronous):
//!   POST /chat ──► queue (QUEUED) ──claim──► worker
//!       worker: embed query ──► index search ──► context ──► completion
//!   worker writes DONE/FAILED ──► GET /job-status polls the record
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ragloom::chunker::{Chunker, Document};
//! use ragloom::config::ChunkerConfig;
//! use ragloom::embedder::{EmbeddingProvider, HashEmbeddingProvider};
//! use ragloom::index::{MemoryIndex, VectorIndex};
//!
//! # async fn demo() -> Result<(), ragloom::error::RagError> {
//! let chunker = Chunker::new(ChunkerConfig::new(100, 20)?)?;
//! let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new(64));
//! let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new(64));
//!
//! let doc = Document::new("notes.md", "chunk me into overlapping pieces");
//! let report = ragloom::ingest::ingest_text(&doc, &chunker, &embedder, &index, 16).await?;
//! assert_eq!(report.chunks_indexed, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module guide
//!
//! - [`chunker`] - Overlapping, provenance-tagged document splitting
//! - [`embedder`] - Text-to-vector providers (HTTP and deterministic hash)
//! - [`index`] - Vector storage and cosine similarity search
//! - [`context`] - Bounded prompt-context assembly
//! - [`completion`] - Answer-generation client boundary
//! - [`queue`] - Job lifecycle, stores, and the worker pool
//! - [`pipeline`] - The per-query processing sequence
//! - [`ingest`] - Batch document ingestion
//! - [`api`] - The axum submit/poll surface

pub mod api;
pub mod chunker;
pub mod completion;
pub mod config;
pub mod context;
pub mod embedder;
pub mod error;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod queue;
