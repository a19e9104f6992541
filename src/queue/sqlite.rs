//! SQLite-backed job store using sqlx.
//!
//! Job records survive both the API process and the worker processes; the
//! claim statement is a single `UPDATE ... RETURNING`, so SQLite's write
//! serialization gives the required mutual exclusion between claimers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use crate::error::{RagError, Result};

use super::{Job, JobId, JobStatus, JobStore};

/// Persistent job store. Cheap to clone; the pool is shared.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteJobStore").finish()
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so string
/// comparison in SQL matches chronological order.
fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| RagError::Storage(format!("bad timestamp '{raw}': {err}")))
}

fn row_to_job(row: &SqliteRow) -> Result<Job> {
    let id_raw: String = row.get("id");
    let id = JobId::parse(&id_raw)
        .ok_or_else(|| RagError::Storage(format!("bad job id '{id_raw}'")))?;
    let status_raw: String = row.get("status");
    let status = JobStatus::decode(&status_raw)
        .ok_or_else(|| RagError::Storage(format!("bad job status '{status_raw}'")))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(Job {
        id,
        query: row.get("query"),
        status,
        result: row.get("result"),
        error: row.get("error"),
        attempts: row.get::<i64, _>("attempts") as u32,
        worker: row.get("worker"),
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

impl SqliteJobStore {
    /// Connects (or creates) the database at `database_url` and runs the
    /// embedded migrations.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| RagError::Storage(format!("connect error: {e}")))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RagError::Storage(format!("migration failure: {e}")))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Wraps an already-migrated pool (shared with the vector index).
    pub fn with_pool(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// The underlying pool, for sharing with [`crate::index::SqliteIndex`].
    pub fn pool(&self) -> Arc<SqlitePool> {
        self.pool.clone()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, query), err)]
    async fn submit(&self, query: &str) -> Result<Job> {
        let job = Job::queued(query);
        sqlx::query(
            r#"
            INSERT INTO jobs (id, query, status, attempts, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.query)
        .bind(job.status.as_str())
        .bind(encode_time(job.created_at))
        .bind(encode_time(job.updated_at))
        .execute(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("insert job: {e}")))?;
        Ok(job)
    }

    #[instrument(skip(self), err)]
    async fn claim(&self, worker_id: &str, visibility_timeout: Duration) -> Result<Option<Job>> {
        let now = Utc::now();
        let stale_before = encode_time(
            now - chrono::Duration::from_std(visibility_timeout)
                .map_err(|err| RagError::Configuration(err.to_string()))?,
        );

        // Single statement: whoever's UPDATE runs first wins the job.
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running',
                worker = ?1,
                attempts = attempts + 1,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'queued'
                   OR (status = 'running' AND updated_at < ?3)
                ORDER BY created_at ASC
                LIMIT 1
            )
            RETURNING id, query, status, result, error, attempts, worker,
                      created_at, updated_at
            "#,
        )
        .bind(worker_id)
        .bind(encode_time(now))
        .bind(&stale_before)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("claim job: {e}")))?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn heartbeat(&self, id: &JobId) -> Result<()> {
        sqlx::query("UPDATE jobs SET updated_at = ?1 WHERE id = ?2 AND status = 'running'")
            .bind(encode_time(Utc::now()))
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| RagError::Storage(format!("heartbeat: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self, result), err)]
    async fn complete(&self, id: &JobId, result: &str) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'done', result = ?1, updated_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(result)
        .bind(encode_time(Utc::now()))
        .bind(id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("complete job: {e}")))?;
        Ok(outcome.rows_affected() == 1)
    }

    #[instrument(skip(self, error), err)]
    async fn fail(&self, id: &JobId, error: &str) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error = ?1, updated_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(error)
        .bind(encode_time(Utc::now()))
        .bind(id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("fail job: {e}")))?;
        Ok(outcome.rows_affected() == 1)
    }

    async fn get(&self, id: &JobId) -> Result<Job> {
        let row = sqlx::query(
            r#"
            SELECT id, query, status, result, error, attempts, worker,
                   created_at, updated_at
            FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("select job: {e}")))?;

        match row {
            Some(row) => row_to_job(&row),
            None => Err(RagError::JobNotFound(*id)),
        }
    }
}
