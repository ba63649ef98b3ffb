//! SQLite persistence for job records.
//!
//! The store is the single shared mutable resource: every state transition
//! goes through a conditional `UPDATE` whose `rows_affected` count reports
//! whether the compare-and-swap applied. Coordinators never read-modify-write.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::queue::job::{canonical_payload, Job, JobStatus};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection pool with WAL mode so concurrent coordinators can read
/// while one writes. The database file is created on first use.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(DEFAULT_BUSY_TIMEOUT)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    tracing::debug!(database_url, max_connections, "database pool initialized");
    Ok(pool)
}

/// Database row shape; converted to [`Job`] at the repository boundary.
#[derive(Debug, sqlx::FromRow)]
struct JobRecord {
    job_id: String,
    job_type: String,
    payload: String,
    status: String,
    result: Option<String>,
    retry_count: i64,
    locked_by: Option<String>,
    created_at: String,
}

impl TryFrom<JobRecord> for Job {
    type Error = QueueError;

    fn try_from(record: JobRecord) -> Result<Job> {
        let corrupt = |what: &str, detail: String| {
            QueueError::Corrupt(format!("{what} in job {}: {detail}", record.job_id))
        };

        Ok(Job {
            job_id: Uuid::parse_str(&record.job_id)
                .map_err(|e| QueueError::Corrupt(format!("bad job id: {e}")))?,
            status: record.status.parse()?,
            payload: serde_json::from_str(&record.payload)
                .map_err(|e| corrupt("bad payload", e.to_string()))?,
            result: record
                .result
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| corrupt("bad result", e.to_string()))?,
            retry_count: record.retry_count as u32,
            locked_by: record
                .locked_by
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|e| corrupt("bad lock token", e.to_string()))?,
            created_at: DateTime::parse_from_rfc3339(&record.created_at)
                .map_err(|e| corrupt("bad timestamp", e.to_string()))?
                .with_timezone(&Utc),
            job_type: record.job_type,
        })
    }
}

/// Repository over the jobs table.
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the jobs table and its indexes if they do not exist yet.
    ///
    /// The unique index over `(job_type, payload)` backs deduplication: two
    /// submissions racing between the fingerprint lookup and the insert
    /// cannot both create a row.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                job_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                locked_by TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_fingerprint ON jobs (job_type, payload)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status, locked_by)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Persist a new job. A unique violation (either the primary key or the
    /// fingerprint index) surfaces as [`QueueError::Conflict`]; the caller
    /// decides whether it was a dedup race or an id collision.
    pub async fn insert(&self, job: &Job) -> Result<()> {
        let outcome = sqlx::query(
            r#"
            INSERT INTO jobs (job_id, job_type, payload, status, result, retry_count, locked_by, created_at)
            VALUES (?, ?, ?, ?, NULL, ?, NULL, ?)
            "#,
        )
        .bind(job.job_id.to_string())
        .bind(&job.job_type)
        .bind(canonical_payload(&job.payload))
        .bind(job.status.as_str())
        .bind(job.retry_count as i64)
        .bind(job.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(QueueError::Conflict(job.job_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// Dedup lookup: exact match on the `(type, canonical payload)` pair.
    pub async fn find_by_fingerprint(
        &self,
        job_type: &str,
        canonical_payload: &str,
    ) -> Result<Option<Job>> {
        sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE job_type = ? AND payload = ?")
            .bind(job_type)
            .bind(canonical_payload)
            .fetch_optional(&self.pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// List jobs in insertion order, optionally filtered by status.
    pub async fn list(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<Job>> {
        let records = match status {
            Some(status) => {
                sqlx::query_as::<_, JobRecord>(
                    "SELECT * FROM jobs WHERE status = ? ORDER BY created_at, job_id LIMIT ?",
                )
                .bind(status.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobRecord>(
                    "SELECT * FROM jobs ORDER BY created_at, job_id LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        records.into_iter().map(Job::try_from).collect()
    }

    /// Jobs eligible for claiming: queued and not locked by anyone.
    pub async fn claimable(&self, limit: u32) -> Result<Vec<Job>> {
        let records = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'queued' AND locked_by IS NULL
            ORDER BY created_at, job_id
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Job::try_from).collect()
    }

    /// Atomically claim a queued, unlocked job for `worker`. Returns false
    /// if another coordinator won the race or the job was canceled.
    pub async fn claim(&self, job_id: Uuid, worker: Uuid) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs SET status = 'running', locked_by = ?
            WHERE job_id = ? AND status = 'queued' AND locked_by IS NULL
            "#,
        )
        .bind(worker.to_string())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Transition a running job owned by `worker` to `succeeded`.
    pub async fn mark_succeeded(
        &self,
        job_id: Uuid,
        worker: Uuid,
        result: &serde_json::Value,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs SET status = 'succeeded', result = ?, locked_by = NULL
            WHERE job_id = ? AND status = 'running' AND locked_by = ?
            "#,
        )
        .bind(result.to_string())
        .bind(job_id.to_string())
        .bind(worker.to_string())
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Transition a running job owned by `worker` to `failed`, capturing the
    /// error detail as the job result.
    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        worker: Uuid,
        error: &serde_json::Value,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs SET status = 'failed', result = ?, locked_by = NULL
            WHERE job_id = ? AND status = 'running' AND locked_by = ?
            "#,
        )
        .bind(error.to_string())
        .bind(job_id.to_string())
        .bind(worker.to_string())
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Put a failed attempt back on the queue: clear the lock and bump the
    /// retry count so the normal poll path can claim it again.
    pub async fn requeue_for_retry(&self, job_id: Uuid, worker: Uuid) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs SET status = 'queued', locked_by = NULL, retry_count = retry_count + 1
            WHERE job_id = ? AND status = 'running' AND locked_by = ?
            "#,
        )
        .bind(job_id.to_string())
        .bind(worker.to_string())
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Put every running job back on the queue, clearing its lock. Returns
    /// the number of rows recovered.
    ///
    /// Intended for startup after a crash left rows claimed by a dead
    /// coordinator. Only safe when no other coordinator shares the store:
    /// a live owner's job would be re-queued under it and could run twice
    /// (within the at-least-once contract, but avoidable).
    pub async fn requeue_interrupted(&self) -> Result<u64> {
        let outcome =
            sqlx::query("UPDATE jobs SET status = 'queued', locked_by = NULL WHERE status = 'running'")
                .execute(&self.pool)
                .await?;
        Ok(outcome.rows_affected())
    }

    /// Cancel a job that has not been claimed yet. Fails the swap (returns
    /// false) if a claim won the race, the job is already terminal, or no
    /// such job exists.
    pub async fn cancel_if_queued(&self, job_id: Uuid) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs SET status = 'canceled'
            WHERE job_id = ? AND status = 'queued' AND locked_by IS NULL
            "#,
        )
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }
}
