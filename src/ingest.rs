//! Offline ingestion pass: document → chunks → embeddings → vector index.
//!
//! Ingestion is a batch interface, not a network endpoint. It may run
//! concurrently with query-time searches; each upsert batch becomes visible
//! atomically.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::info;

use crate::chunker::{Chunker, Document};
use crate::embedder::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

/// Summary of one ingestion pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Total chunks embedded and written to the index.
    pub chunks_indexed: usize,
    /// Number of upsert batches issued.
    pub batches: usize,
}

/// Chunks, embeds, and indexes one document, in `batch_size`-chunk batches.
pub async fn ingest_text(
    document: &Document,
    chunker: &Chunker,
    embedder: &Arc<dyn EmbeddingProvider>,
    index: &Arc<dyn VectorIndex>,
    batch_size: usize,
) -> Result<IngestReport> {
    let batch_size = batch_size.max(1);
    let mut report = IngestReport::default();
    let mut pending = Vec::with_capacity(batch_size);

    for chunk in chunker.split(document) {
        pending.push(chunk);
        if pending.len() == batch_size {
            flush(&mut pending, embedder, index, &mut report).await?;
        }
    }
    if !pending.is_empty() {
        flush(&mut pending, embedder, index, &mut report).await?;
    }

    info!(
        source = %document.source,
        chunks = report.chunks_indexed,
        batches = report.batches,
        "document ingested"
    );
    Ok(report)
}

/// Reads a UTF-8 text file and ingests it. The file path becomes the
/// chunks' source identifier.
pub async fn ingest_document(
    path: impl AsRef<Path>,
    chunker: &Chunker,
    embedder: &Arc<dyn EmbeddingProvider>,
    index: &Arc<dyn VectorIndex>,
    batch_size: usize,
) -> Result<IngestReport> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).await?;
    let document = Document::new(path.to_string_lossy(), text);
    ingest_text(&document, chunker, embedder, index, batch_size).await
}

async fn flush(
    pending: &mut Vec<crate::chunker::Chunk>,
    embedder: &Arc<dyn EmbeddingProvider>,
    index: &Arc<dyn VectorIndex>,
    report: &mut IngestReport,
) -> Result<()> {
    let chunks = std::mem::take(pending);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_many(&texts).await?;
    let batch: Vec<_> = embeddings.into_iter().zip(chunks).collect();
    report.chunks_indexed += batch.len();
    report.batches += 1;
    index.upsert(batch).await?;
    Ok(())
}
