//! Batch ingestion: chunk a text file, embed it, and populate the index.
//!
//! Run with:
//!   cargo run --bin ragloom-ingest -- <path> [chunk_size] [chunk_overlap]

use std::sync::Arc;

use reqwest::Client;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use ragloom::chunker::Chunker;
use ragloom::config::{ChunkerConfig, ModelServiceConfig, database_url_from_env};
use ragloom::embedder::{EmbeddingProvider, HttpEmbeddingProvider};
use ragloom::index::{SqliteIndex, VectorIndex};
use ragloom::ingest::ingest_document;

const EMBEDDING_DIMENSIONS: usize = 768;
const EMBED_BATCH_SIZE: usize = 32;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or("usage: ragloom-ingest <path> [chunk_size] [chunk_overlap]")?;
    let defaults = ChunkerConfig::default();
    let chunk_size = match args.next() {
        Some(raw) => raw.parse()?,
        None => defaults.chunk_size,
    };
    let chunk_overlap = match args.next() {
        Some(raw) => raw.parse()?,
        None => defaults.chunk_overlap,
    };

    let chunker = Chunker::new(ChunkerConfig::new(chunk_size, chunk_overlap)?)?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        Client::new(),
        ModelServiceConfig::embedding_from_env()?,
        EMBEDDING_DIMENSIONS,
    ));
    let index: Arc<dyn VectorIndex> = Arc::new(
        SqliteIndex::connect(&database_url_from_env(), EMBEDDING_DIMENSIONS).await?,
    );

    let report = ingest_document(&path, &chunker, &embedder, &index, EMBED_BATCH_SIZE).await?;
    info!(
        path,
        chunks = report.chunks_indexed,
        batches = report.batches,
        total_entries = index.len().await?,
        "ingestion complete"
    );
    println!("Total Chunks: {}", report.chunks_indexed);
    Ok(())
}
