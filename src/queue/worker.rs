//! Worker pool that drains the job queue.
//!
//! Each worker is an independent tokio task looping claim → process →
//! terminal write. Workers are woken by a flume signal when the API submits
//! work, and otherwise poll on an interval (which also picks up stale-owner
//! reclaims). Pipeline failures are recorded on the job, never propagated:
//! one bad job must not take down the loop.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::pipeline::QueryPipeline;

use super::{Job, JobStore};

/// Spawns and owns the query worker tasks.
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    pipeline: QueryPipeline,
    config: QueueConfig,
    wakeup: flume::Receiver<()>,
}

/// Handle for shutting the pool down and waiting for workers to drain.
pub struct WorkerPoolHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Signals all workers to stop after their current job and waits for
    /// them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = futures_util::future::join_all(self.tasks).await;
    }
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: QueryPipeline,
        config: QueueConfig,
        wakeup: flume::Receiver<()>,
    ) -> Self {
        Self {
            store,
            pipeline,
            config,
            wakeup,
        }
    }

    /// Starts `config.workers` tasks and returns the shutdown handle.
    pub fn spawn(self) -> WorkerPoolHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(self.config.workers);
        for n in 0..self.config.workers {
            let worker = Worker {
                id: format!("worker-{n}"),
                store: self.store.clone(),
                pipeline: self.pipeline.clone(),
                config: self.config.clone(),
                wakeup: self.wakeup.clone(),
                shutdown: shutdown_rx.clone(),
            };
            tasks.push(tokio::spawn(worker.run()));
        }
        WorkerPoolHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

struct Worker {
    id: String,
    store: Arc<dyn JobStore>,
    pipeline: QueryPipeline,
    config: QueueConfig,
    wakeup: flume::Receiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        info!(worker = %self.id, "worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self
                .store
                .claim(&self.id, self.config.visibility_timeout)
                .await
            {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    if self.idle().await {
                        break;
                    }
                }
                Err(err) => {
                    error!(worker = %self.id, %err, "claim failed");
                    if self.idle().await {
                        break;
                    }
                }
            }
        }
        info!(worker = %self.id, "worker stopped");
    }

    /// Waits for a submit wakeup, the poll interval, or shutdown.
    /// Returns `true` when the worker should exit.
    async fn idle(&mut self) -> bool {
        tokio::select! {
            _ = self.wakeup.recv_async() => false,
            _ = tokio::time::sleep(self.config.poll_interval) => false,
            _ = self.shutdown.changed() => *self.shutdown.borrow(),
        }
    }

    /// Runs the pipeline for one claimed job and writes the terminal state.
    ///
    /// The worker holds no store lock during the embedding or completion
    /// calls; exclusive RUNNING ownership of the job record is the only
    /// isolation needed. A heartbeat between retrieval and generation keeps
    /// a healthy owner from being reclaimed during a slow completion call.
    async fn process(&self, job: Job) {
        info!(worker = %self.id, job = %job.id, attempts = job.attempts, "processing job");

        let outcome = async {
            let retrieved = self.pipeline.retrieve(&job.query).await?;
            self.store.heartbeat(&job.id).await?;
            let prompt = self.pipeline.build_prompt(&retrieved);
            self.pipeline.generate(&prompt, &job.query).await
        }
        .await;

        let written = match outcome {
            Ok(answer) => self.store.complete(&job.id, &answer).await,
            Err(err) => {
                warn!(worker = %self.id, job = %job.id, %err, "job failed");
                self.store.fail(&job.id, &err.to_string()).await
            }
        };

        match written {
            Ok(true) => {}
            Ok(false) => {
                // Someone reclaimed and finished this job first; our result
                // is discarded rather than overwriting a terminal state.
                warn!(worker = %self.id, job = %job.id, "lost ownership before terminal write");
            }
            Err(err) => {
                error!(worker = %self.id, job = %job.id, %err, "terminal write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionClient, StaticCompletionClient};
    use crate::context::ContextAssembler;
    use crate::embedder::HashEmbeddingProvider;
    use crate::error::{RagError, Result};
    use crate::index::MemoryIndex;
    use crate::queue::{JobStatus, MemoryJobStore};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingCompletion;

    #[async_trait]
    impl CompletionClient for FailingCompletion {
        async fn complete(&self, _: &str, _: &str) -> Result<String> {
            Err(RagError::CompletionService("rate limited".into()))
        }
    }

    fn pipeline(completion: Arc<dyn CompletionClient>) -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(HashEmbeddingProvider::new(16)),
            Arc::new(MemoryIndex::new(16)),
            ContextAssembler::default(),
            completion,
            2,
        )
    }

    fn fast_config() -> QueueConfig {
        QueueConfig::default()
            .with_workers(1)
            .with_poll_interval(Duration::from_millis(10))
    }

    async fn wait_for_terminal(
        store: &MemoryJobStore,
        id: &crate::queue::JobId,
    ) -> crate::queue::Job {
        use crate::queue::JobStore;
        for _ in 0..200 {
            let job = store.get(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn worker_completes_a_job() {
        let store = Arc::new(MemoryJobStore::new());
        let (wake_tx, wake_rx) = flume::unbounded();
        let pool = WorkerPool::new(
            store.clone(),
            pipeline(Arc::new(StaticCompletionClient::new("done!"))),
            fast_config(),
            wake_rx,
        );
        let handle = pool.spawn();

        let job = store.submit("a question").await.unwrap();
        let _ = wake_tx.send(());

        let finished = wait_for_terminal(&store, &job.id).await;
        assert_eq!(finished.status, JobStatus::Done);
        assert_eq!(finished.result.as_deref(), Some("done!"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn completion_failure_marks_job_failed_and_loop_survives() {
        let store = Arc::new(MemoryJobStore::new());
        let (wake_tx, wake_rx) = flume::unbounded();
        let handle = WorkerPool::new(
            store.clone(),
            pipeline(Arc::new(FailingCompletion)),
            fast_config(),
            wake_rx,
        )
        .spawn();

        let first = store.submit("will fail").await.unwrap();
        let second = store.submit("also fails").await.unwrap();
        let _ = wake_tx.send(());
        let _ = wake_tx.send(());

        let first = wait_for_terminal(&store, &first.id).await;
        assert_eq!(first.status, JobStatus::Failed);
        assert!(first.error.as_deref().unwrap().contains("rate limited"));

        // The loop survived the first failure and processed the next job.
        let second = wait_for_terminal(&store, &second.id).await;
        assert_eq!(second.status, JobStatus::Failed);
        handle.shutdown().await;
    }
}
