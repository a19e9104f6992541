//! Asynchronous job queue: lifecycle types, the store trait, and backends.
//!
//! The API layer and the worker pool run concurrently and share nothing but
//! a [`JobStore`]; the store's claim operation is the single mutual-exclusion
//! point in the system. A claimed job is owned exclusively by one worker
//! until it reaches a terminal state, after which it is read-only.
//!
//! ```text
//!   submit ──► QUEUED ──claim──► RUNNING ──complete──► DONE
//!                ▲                  │
//!                │                  └───fail─────────► FAILED
//!                │                  │
//!                └──(stale owner)───┘  reclaim after visibility timeout
//! ```

pub mod memory;
pub mod sqlite;
pub mod worker;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;
pub use worker::{WorkerPool, WorkerPoolHandle};

/// Unique identifier of a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a caller-supplied id; `None` for anything that is not a UUID.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a job. `Done` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn decode(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// A unit of asynchronous query work with an observable lifecycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub query: String,
    pub status: JobStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    /// How many times the job has been claimed; greater than 1 means a
    /// stale-owner reclaim happened.
    pub attempts: u32,
    /// Identifier of the worker currently (or last) holding the job.
    pub worker: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn queued(query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            query: query.into(),
            status: JobStatus::Queued,
            result: None,
            error: None,
            attempts: 0,
            worker: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable record of jobs and the queue's synchronization point.
///
/// Implementations must make [`JobStore::claim`] atomic with respect to
/// concurrent claimers: under W simultaneous claim attempts on one QUEUED
/// job, exactly one wins. Terminal transitions return `false` when the
/// caller no longer owns the job (e.g. it was reclaimed and finished by
/// another worker), so a late writer can never corrupt a terminal state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates a QUEUED job and returns it immediately; never blocks on
    /// processing.
    async fn submit(&self, query: &str) -> Result<Job>;

    /// Atomically claims the oldest QUEUED job, or a RUNNING job whose
    /// `updated_at` is older than `visibility_timeout`, marking it RUNNING
    /// under `worker_id`. Returns `None` when nothing is claimable.
    async fn claim(&self, worker_id: &str, visibility_timeout: Duration) -> Result<Option<Job>>;

    /// Refreshes `updated_at` on a RUNNING job so a healthy owner is not
    /// reclaimed mid-flight.
    async fn heartbeat(&self, id: &JobId) -> Result<()>;

    /// RUNNING → DONE with a result. Returns `false` if the job was not
    /// RUNNING (ownership was lost).
    async fn complete(&self, id: &JobId, result: &str) -> Result<bool>;

    /// RUNNING → FAILED with the error recorded. Returns `false` if the job
    /// was not RUNNING.
    async fn fail(&self, id: &JobId, error: &str) -> Result<bool>;

    /// Non-blocking read of current job state; repeated reads of a terminal
    /// job are idempotent. Unknown ids fail with [`crate::error::RagError::JobNotFound`].
    async fn get(&self, id: &JobId) -> Result<Job>;
}
