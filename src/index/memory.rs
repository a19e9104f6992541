//! In-memory vector index for tests, demos, and single-process deployments.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::chunker::Chunk;
use crate::embedder::Embedding;
use crate::error::Result;

use super::{IndexEntry, ScoredChunk, VectorIndex, check_dimensions, cosine_similarity, rank};

/// Append-only index held behind a single `RwLock`.
///
/// A whole `upsert` batch is appended under one write guard, so concurrent
/// searches observe either none or all of it.
pub struct MemoryIndex {
    dimensions: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, entries: Vec<(Embedding, Chunk)>) -> Result<Vec<u64>> {
        // Validate the full batch before touching the store so a mismatch
        // leaves the index unchanged.
        for (embedding, _) in &entries {
            check_dimensions(self.dimensions, embedding)?;
        }

        let mut guard = self.entries.write();
        let mut ids = Vec::with_capacity(entries.len());
        for (embedding, chunk) in entries {
            let entry_id = guard.len() as u64 + 1;
            guard.push(IndexEntry {
                entry_id,
                chunk,
                embedding,
            });
            ids.push(entry_id);
        }
        Ok(ids)
    }

    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ScoredChunk>> {
        check_dimensions(self.dimensions, query)?;
        let guard = self.entries.read();
        let candidates = guard
            .iter()
            .map(|entry| ScoredChunk {
                entry_id: entry.entry_id,
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
