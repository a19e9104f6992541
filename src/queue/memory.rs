//! In-memory job store for tests and single-process deployments.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{RagError, Result};

use super::{Job, JobId, JobStatus, JobStore};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// Submission order; ids stay queued here until claimed.
    fifo: VecDeque<JobId>,
}

/// Job store held behind a single async mutex.
///
/// The mutex makes claim atomic: concurrent claimers serialize on the lock
/// and each QUEUED job is handed to exactly one of them.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn submit(&self, query: &str) -> Result<Job> {
        let job = Job::queued(query);
        let mut inner = self.inner.lock().await;
        inner.fifo.push_back(job.id);
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim(&self, worker_id: &str, visibility_timeout: Duration) -> Result<Option<Job>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        // Oldest queued job first.
        while let Some(id) = inner.fifo.pop_front() {
            let Some(job) = inner.jobs.get_mut(&id) else {
                continue;
            };
            if job.status != JobStatus::Queued {
                continue;
            }
            job.status = JobStatus::Running;
            job.attempts += 1;
            job.worker = Some(worker_id.to_string());
            job.updated_at = now;
            return Ok(Some(job.clone()));
        }

        // No queued work: look for a stale RUNNING job to reclaim.
        let timeout = chrono::Duration::from_std(visibility_timeout)
            .map_err(|err| RagError::Configuration(err.to_string()))?;
        let stale = inner
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Running && now - job.updated_at > timeout)
            .min_by_key(|job| job.updated_at)
            .map(|job| job.id);
        if let Some(job) = stale.and_then(|id| inner.jobs.get_mut(&id)) {
            job.attempts += 1;
            job.worker = Some(worker_id.to_string());
            job.updated_at = now;
            return Ok(Some(job.clone()));
        }

        Ok(None)
    }

    async fn heartbeat(&self, id: &JobId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Running => {
                job.updated_at = Utc::now();
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(RagError::JobNotFound(*id)),
        }
    }

    async fn complete(&self, id: &JobId, result: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(id).ok_or(RagError::JobNotFound(*id))?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.status = JobStatus::Done;
        job.result = Some(result.to_string());
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(id).ok_or(RagError::JobNotFound(*id))?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn get(&self, id: &JobId) -> Result<Job> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .get(id)
            .cloned()
            .ok_or(RagError::JobNotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const LONG_TIMEOUT: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn submit_then_claim_transitions_to_running() {
        let store = MemoryJobStore::new();
        let job = store.submit("what is ownership?").await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let claimed = store.claim("w1", LONG_TIMEOUT).await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.worker.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn claim_is_mutually_exclusive() {
        let store = Arc::new(MemoryJobStore::new());
        store.submit("contested").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim(&format!("w{i}"), LONG_TIMEOUT).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn claims_are_fifo() {
        let store = MemoryJobStore::new();
        let first = store.submit("first").await.unwrap();
        let second = store.submit("second").await.unwrap();

        assert_eq!(
            store.claim("w", LONG_TIMEOUT).await.unwrap().unwrap().id,
            first.id
        );
        assert_eq!(
            store.claim("w", LONG_TIMEOUT).await.unwrap().unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn stale_running_job_is_reclaimable() {
        let store = MemoryJobStore::new();
        store.submit("slow").await.unwrap();
        let claimed = store.claim("w1", LONG_TIMEOUT).await.unwrap().unwrap();

        // Not yet stale.
        assert!(
            store
                .claim("w2", Duration::from_secs(60))
                .await
                .unwrap()
                .is_none()
        );

        // A zero timeout makes any running job immediately stale.
        let reclaimed = store
            .claim("w2", Duration::from_secs(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.id, claimed.id);
        assert_eq!(reclaimed.attempts, 2);
        assert_eq!(reclaimed.worker.as_deref(), Some("w2"));
    }

    #[tokio::test]
    async fn late_owner_cannot_overwrite_terminal_state() {
        let store = MemoryJobStore::new();
        let job = store.submit("raced").await.unwrap();
        store.claim("w1", LONG_TIMEOUT).await.unwrap().unwrap();
        store.claim("w2", Duration::from_secs(0)).await.unwrap();

        assert!(store.complete(&job.id, "w2 answer").await.unwrap());
        // w1 comes back late; its write is rejected.
        assert!(!store.complete(&job.id, "w1 answer").await.unwrap());
        assert!(!store.fail(&job.id, "w1 error").await.unwrap());

        let current = store.get(&job.id).await.unwrap();
        assert_eq!(current.result.as_deref(), Some("w2 answer"));
        assert_eq!(current.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn polling_terminal_job_is_idempotent() {
        let store = MemoryJobStore::new();
        let job = store.submit("poll me").await.unwrap();
        store.claim("w", LONG_TIMEOUT).await.unwrap().unwrap();
        store.complete(&job.id, "the answer").await.unwrap();

        let first = store.get(&job.id).await.unwrap();
        let second = store.get(&job.id).await.unwrap();
        assert_eq!(first.result, second.result);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.get(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, RagError::JobNotFound(_)));
    }
}
