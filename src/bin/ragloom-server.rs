//! API server plus in-process worker pool.
//!
//! Run with:
//!   cargo run --bin ragloom-server
//!
//! Then, in another terminal:
//!   curl -X POST 'http://127.0.0.1:3000/chat?query=what+is+ownership'
//!   curl 'http://127.0.0.1:3000/job-status?job_id=<id>'

use std::net::SocketAddr;
use std::sync::Arc;

use miette::IntoDiagnostic;
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use ragloom::api::{AppState, router};
use ragloom::completion::HttpCompletionClient;
use ragloom::config::{
    ContextConfig, ModelServiceConfig, QueueConfig, database_url_from_env,
};
use ragloom::context::ContextAssembler;
use ragloom::embedder::{EmbeddingProvider, HttpEmbeddingProvider};
use ragloom::index::{SqliteIndex, VectorIndex};
use ragloom::pipeline::QueryPipeline;
use ragloom::queue::{JobStore, SqliteJobStore, WorkerPool};

/// Embedding dimension of the deployed model. Ingestion and queries must
/// agree on this; the index rejects anything else.
const EMBEDDING_DIMENSIONS: usize = 768;

#[tokio::main]
async fn main() -> miette::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let database_url = database_url_from_env();
    let store = SqliteJobStore::connect(&database_url).await?;
    let index = SqliteIndex::with_pool(store.pool(), EMBEDDING_DIMENSIONS);

    let http = Client::new();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        http.clone(),
        ModelServiceConfig::embedding_from_env()?,
        EMBEDDING_DIMENSIONS,
    ));
    let completion = Arc::new(HttpCompletionClient::new(
        http,
        ModelServiceConfig::completion_from_env()?,
    ));

    let queue_config = QueueConfig::default();
    let pipeline = QueryPipeline::new(
        embedder,
        Arc::new(index) as Arc<dyn VectorIndex>,
        ContextAssembler::new(ContextConfig::default()),
        completion,
        queue_config.top_k,
    );

    let store: Arc<dyn JobStore> = Arc::new(store);
    let (wakeup_tx, wakeup_rx) = flume::unbounded();
    let workers = WorkerPool::new(store.clone(), pipeline, queue_config, wakeup_rx).spawn();

    let app = router(AppState {
        store,
        wakeup: wakeup_tx,
    });

    let addr: SocketAddr = "127.0.0.1:3000".parse().into_diagnostic()?;
    let listener = TcpListener::bind(addr).await.into_diagnostic()?;
    info!(%addr, "ragloom server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .into_diagnostic()?;

    workers.shutdown().await;
    Ok(())
}
