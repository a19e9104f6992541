//! SQLite-backed vector index using sqlx.
//!
//! Entries persist across process restarts; the embedded migrations create
//! the schema on connect. Embeddings are stored as JSON arrays and scored in
//! the application, which keeps the backend dependency-free and the result
//! order fully deterministic (similarity descending, entry id ascending).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use crate::chunker::Chunk;
use crate::embedder::Embedding;
use crate::error::{RagError, Result};

use super::{ScoredChunk, VectorIndex, check_dimensions, cosine_similarity, rank};

/// Persistent vector index. Cheap to clone; the pool is shared.
#[derive(Clone)]
pub struct SqliteIndex {
    pool: Arc<SqlitePool>,
    dimensions: usize,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl SqliteIndex {
    /// Connects (or creates) the database at `database_url` and runs the
    /// embedded migrations. Example URL: `sqlite://ragloom.db`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, dimensions: usize) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| RagError::Storage(format!("connect error: {e}")))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RagError::Storage(format!("migration failure: {e}")))?;
        Ok(Self {
            pool: Arc::new(pool),
            dimensions,
        })
    }

    /// Wraps an already-migrated pool (shared with the job store).
    pub fn with_pool(pool: Arc<SqlitePool>, dimensions: usize) -> Self {
        Self { pool, dimensions }
    }

    fn row_to_candidate(&self, row: &SqliteRow, query: &[f32]) -> Result<ScoredChunk> {
        let entry_id: i64 = row.get("entry_id");
        let embedding_json: String = row.get("embedding");
        let embedding: Embedding = serde_json::from_str(&embedding_json)?;
        let page: Option<i64> = row.get("page");
        let chunk = Chunk {
            text: row.get("content"),
            source: row.get("source"),
            page: page.map(|p| p as u32),
            sequence_index: row.get::<i64, _>("sequence_index") as usize,
            char_offset: row.get::<i64, _>("char_offset") as usize,
        };
        Ok(ScoredChunk {
            entry_id: entry_id as u64,
            chunk,
            score: cosine_similarity(query, &embedding),
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[instrument(skip(self, entries), fields(batch = entries.len()), err)]
    async fn upsert(&self, entries: Vec<(Embedding, Chunk)>) -> Result<Vec<u64>> {
        for (embedding, _) in &entries {
            check_dimensions(self.dimensions, embedding)?;
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        // One transaction per batch: concurrent searches see all or nothing.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RagError::Storage(format!("tx begin: {e}")))?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(entries.len());
        for (embedding, chunk) in entries {
            let embedding_json = serde_json::to_string(&embedding)?;
            let row = sqlx::query(
                r#"
                INSERT INTO index_entries (
                    source, page, sequence_index, char_offset,
                    content, embedding, dimensions, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                RETURNING entry_id
                "#,
            )
            .bind(&chunk.source)
            .bind(chunk.page.map(|p| p as i64))
            .bind(chunk.sequence_index as i64)
            .bind(chunk.char_offset as i64)
            .bind(&chunk.text)
            .bind(&embedding_json)
            .bind(self.dimensions as i64)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RagError::Storage(format!("insert entry: {e}")))?;
            ids.push(row.get::<i64, _>("entry_id") as u64);
        }

        tx.commit()
            .await
            .map_err(|e| RagError::Storage(format!("tx commit: {e}")))?;
        Ok(ids)
    }

    #[instrument(skip(self, query), err)]
    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ScoredChunk>> {
        check_dimensions(self.dimensions, query)?;

        let rows = sqlx::query(
            r#"
            SELECT entry_id, source, page, sequence_index, char_offset,
                   content, embedding
            FROM index_entries
            ORDER BY entry_id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("select entries: {e}")))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            candidates.push(self.row_to_candidate(row, query)?);
        }
        Ok(rank(candidates, k))
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| RagError::Storage(format!("count entries: {e}")))?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
