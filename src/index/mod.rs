//! Vector storage and similarity search over embedded chunks.
//!
//! The [`VectorIndex`] trait abstracts over backends so ingestion and query
//! code never touch a specific database:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorIndex trait│
//!                  │  (async upsert / │
//!                  │   search)        │
//!                  └────────┬─────────┘
//!                           │
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!         ┌─────────────┐       ┌─────────────┐
//!         │ MemoryIndex │       │ SqliteIndex │
//!         │ (tests/dev) │       │ (sqlx, WAL) │
//!         └─────────────┘       └─────────────┘
//! ```
//!
//! Every backend enforces the deployment-wide embedding dimension at the
//! upsert/search boundary and guarantees a deterministic result order:
//! cosine similarity descending, ties broken by ascending entry id, so
//! repeated identical queries against an unchanged index are reproducible.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::embedder::Embedding;
use crate::error::{RagError, Result};

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

/// A stored (embedding, chunk) pair. Entries are append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub entry_id: u64,
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub entry_id: u64,
    pub chunk: Chunk,
    pub score: f32,
}

/// Append-only store of embedded chunks supporting nearest-neighbour search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Appends a batch of entries, returning their assigned entry ids in
    /// input order.
    ///
    /// The whole batch becomes visible to concurrent searches at once or not
    /// at all. Any embedding whose dimension differs from
    /// [`VectorIndex::dimensions`] fails the call with
    /// [`RagError::DimensionMismatch`] and leaves the index unchanged.
    async fn upsert(&self, entries: Vec<(Embedding, Chunk)>) -> Result<Vec<u64>>;

    /// Returns up to `k` entries most similar to `query`, cosine similarity
    /// descending, ties broken by ascending entry id.
    ///
    /// An index holding fewer than `k` entries returns what it has; an empty
    /// index returns an empty vec, never an error.
    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of entries currently stored.
    async fn len(&self) -> Result<usize>;

    /// The fixed embedding dimension this index accepts.
    fn dimensions(&self) -> usize;
}

/// Cosine similarity between two same-length vectors.
///
/// Magnitude is not semantically meaningful for the supported model family,
/// so the metric normalises both sides. Zero vectors score 0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Shared dimension guard used by all backends.
pub(crate) fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(RagError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

/// Orders scored candidates into the deterministic result ranking.
pub(crate) fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.entry_id.cmp(&b.entry_id))
    });
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_is_scale_invariant() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_breaks_ties_by_entry_id() {
        let chunk = Chunk {
            text: "x".into(),
            source: "s".into(),
            page: None,
            sequence_index: 0,
            char_offset: 0,
        };
        let candidates = vec![
            ScoredChunk {
                entry_id: 9,
                chunk: chunk.clone(),
                score: 0.5,
            },
            ScoredChunk {
                entry_id: 3,
                chunk: chunk.clone(),
                score: 0.5,
            },
            ScoredChunk {
                entry_id: 1,
                chunk,
                score: 0.9,
            },
        ];
        let ranked = rank(candidates, 3);
        assert_eq!(
            ranked.iter().map(|s| s.entry_id).collect::<Vec<_>>(),
            vec![1, 3, 9]
        );
    }
}
