//! Job repository: the durable store behind the job queue.
//!
//! Every state transition is a single conditional `UPDATE ... RETURNING`
//! statement, so two workers can never both observe a successful claim or
//! acknowledgement of the same job. Acknowledgements are fenced by the
//! lease token handed out at claim time.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use fileworks_core::types::id::{FileId, JobId};
use fileworks_entity::job::{BackoffPolicy, CreateJob, Job, JobKind, JobPayload, JobState, Lease};

use super::{from_millis, to_millis};
use crate::error::JobStoreError;

type StoreResult<T> = Result<T, JobStoreError>;

const CLAIM_NEXT: &str = "UPDATE jobs SET state = 'active', attempts = attempts + 1, \
     lease_owner = ?, lease_token = ?, lease_expires_at = ?, updated_at = ? \
     WHERE id = ( \
        SELECT id FROM jobs \
        WHERE (state IN ('waiting', 'failed_retryable') AND next_run_at <= ?) \
           OR (state = 'active' AND lease_expires_at <= ? AND attempts < max_attempts) \
        ORDER BY next_run_at ASC, created_at ASC, rowid ASC \
        LIMIT 1 \
     ) RETURNING *";

const CLEAR_LEASE: &str = "lease_owner = NULL, lease_token = NULL, lease_expires_at = NULL";

/// Raw `jobs` row.
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    kind: String,
    payload: String,
    state: String,
    attempts: i64,
    max_attempts: i64,
    backoff: String,
    last_error: Option<String>,
    result: Option<String>,
    lease_owner: Option<String>,
    lease_token: Option<String>,
    lease_expires_at: Option<i64>,
    next_run_at: i64,
    finished_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn corrupt(id: &str, what: impl std::fmt::Display) -> JobStoreError {
    JobStoreError::Corrupt(format!("job {id}: {what}"))
}

fn timestamp(id: &str, column: &str, ms: i64) -> StoreResult<DateTime<Utc>> {
    from_millis(ms).ok_or_else(|| corrupt(id, format!("{column} out of range ({ms})")))
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        let id = &row.id;

        let lease = match (&row.lease_owner, &row.lease_token, row.lease_expires_at) {
            (Some(owner), Some(token), Some(expires)) => Some(Lease {
                worker_id: owner.clone(),
                token: Uuid::parse_str(token).map_err(|e| corrupt(id, e))?,
                expires_at: timestamp(id, "lease_expires_at", expires)?,
            }),
            _ => None,
        };

        let result = row
            .result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt(id, e))?;

        Ok(Job {
            id: id.parse::<JobId>().map_err(|e| corrupt(id, e))?,
            kind: row.kind.parse::<JobKind>().map_err(|e| corrupt(id, e))?,
            payload: serde_json::from_str::<JobPayload>(&row.payload)
                .map_err(|e| corrupt(id, e))?,
            state: row.state.parse::<JobState>().map_err(|e| corrupt(id, e))?,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt(id, e))?,
            max_attempts: u32::try_from(row.max_attempts).map_err(|e| corrupt(id, e))?,
            backoff: serde_json::from_str::<BackoffPolicy>(&row.backoff)
                .map_err(|e| corrupt(id, e))?,
            last_error: row.last_error,
            result,
            lease,
            next_run_at: timestamp(id, "next_run_at", row.next_run_at)?,
            finished_at: row
                .finished_at
                .map(|ms| timestamp(id, "finished_at", ms))
                .transpose()?,
            created_at: timestamp(id, "created_at", row.created_at)?,
            updated_at: timestamp(id, "updated_at", row.updated_at)?,
        })
    }
}

/// Repository for durable job storage and lease-based queue operations.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new job in the `waiting` state.
    pub async fn create(&self, data: &CreateJob, now: DateTime<Utc>) -> StoreResult<Job> {
        let payload = serde_json::to_string(&data.payload)
            .map_err(|e| JobStoreError::InvalidPayload(e.to_string()))?;
        let backoff = serde_json::to_string(&data.backoff)
            .map_err(|e| JobStoreError::InvalidPayload(e.to_string()))?;

        let row = sqlx::query_as::<_, JobRow>(
            "INSERT INTO jobs (id, kind, payload, file_id, state, attempts, max_attempts, \
             backoff, next_run_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'waiting', 0, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(JobId::new().to_string())
        .bind(data.payload.kind().as_str())
        .bind(payload)
        .bind(data.payload.file_id().to_string())
        .bind(i64::from(data.max_attempts))
        .bind(backoff)
        .bind(to_millis(data.run_at))
        .bind(to_millis(now))
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: JobId) -> StoreResult<Option<Job>> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// List every job created for a file, oldest first.
    pub async fn find_by_file(&self, file_id: FileId) -> StoreResult<Vec<Job>> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE file_id = ? ORDER BY created_at ASC")
            .bind(file_id.to_string())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// Atomically lease the next due job.
    ///
    /// Eligible jobs are `waiting` or `failed_retryable` jobs whose
    /// `next_run_at` has passed, and `active` jobs whose lease expired while
    /// attempts remain. Claiming increments `attempts` and issues a fresh
    /// lease token.
    pub async fn claim_next(
        &self,
        worker_id: &str,
        visibility_timeout: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Job>> {
        let now_ms = to_millis(now);
        let expires_ms = now_ms.saturating_add(visibility_timeout.as_millis() as i64);

        sqlx::query_as::<_, JobRow>(CLAIM_NEXT)
            .bind(worker_id)
            .bind(Uuid::new_v4().to_string())
            .bind(expires_ms)
            .bind(now_ms)
            .bind(now_ms)
            .bind(now_ms)
            .fetch_optional(&self.pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// Mark a leased job as completed, storing its result.
    pub async fn complete(
        &self,
        id: JobId,
        lease_token: Uuid,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> StoreResult<Job> {
        let result = result.map(serde_json::Value::to_string);
        let sql = format!(
            "UPDATE jobs SET state = 'completed', result = ?, last_error = NULL, {CLEAR_LEASE}, \
             finished_at = ?, updated_at = ? \
             WHERE id = ? AND state = 'active' AND lease_token = ? RETURNING *"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(result)
            .bind(to_millis(now))
            .bind(to_millis(now))
            .bind(id.to_string())
            .bind(lease_token.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.acknowledged(id, row).await
    }

    /// Record a failed attempt and schedule the next one at `run_at`.
    pub async fn retry_later(
        &self,
        id: JobId,
        lease_token: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Job> {
        let sql = format!(
            "UPDATE jobs SET state = 'failed_retryable', last_error = ?, next_run_at = ?, \
             {CLEAR_LEASE}, updated_at = ? \
             WHERE id = ? AND state = 'active' AND lease_token = ? RETURNING *"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(error)
            .bind(to_millis(run_at))
            .bind(to_millis(now))
            .bind(id.to_string())
            .bind(lease_token.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.acknowledged(id, row).await
    }

    /// Record a failed attempt with no retry left.
    pub async fn fail_terminal(
        &self,
        id: JobId,
        lease_token: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Job> {
        let sql = format!(
            "UPDATE jobs SET state = 'failed_terminal', last_error = ?, {CLEAR_LEASE}, \
             finished_at = ?, updated_at = ? \
             WHERE id = ? AND state = 'active' AND lease_token = ? RETURNING *"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(error)
            .bind(to_millis(now))
            .bind(to_millis(now))
            .bind(id.to_string())
            .bind(lease_token.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.acknowledged(id, row).await
    }

    /// Return a leased job to `waiting` without consuming the attempt.
    pub async fn release(
        &self,
        id: JobId,
        lease_token: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Job> {
        let sql = format!(
            "UPDATE jobs SET state = 'waiting', attempts = MAX(attempts - 1, 0), last_error = ?, \
             next_run_at = ?, {CLEAR_LEASE}, updated_at = ? \
             WHERE id = ? AND state = 'active' AND lease_token = ? RETURNING *"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(error)
            .bind(to_millis(run_at))
            .bind(to_millis(now))
            .bind(id.to_string())
            .bind(lease_token.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.acknowledged(id, row).await
    }

    /// Move `active` jobs whose lease expired on their last attempt to
    /// `failed_terminal`, returning the jobs that were moved.
    pub async fn expire_exhausted_leases(
        &self,
        error: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Job>> {
        let sql = format!(
            "UPDATE jobs SET state = 'failed_terminal', last_error = ?, {CLEAR_LEASE}, \
             finished_at = ?, updated_at = ? \
             WHERE state = 'active' AND lease_expires_at <= ? AND attempts >= max_attempts \
             RETURNING *"
        );
        let now_ms = to_millis(now);
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(error)
            .bind(now_ms)
            .bind(now_ms)
            .bind(now_ms)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// List terminal jobs that finished at or after `since`, newest first.
    pub async fn find_terminal_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<Job>> {
        sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE state IN ('completed', 'failed_terminal') \
             AND finished_at >= ? ORDER BY finished_at DESC, rowid DESC LIMIT ?",
        )
        .bind(to_millis(since))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Job::try_from)
        .collect()
    }

    /// Delete terminal jobs that finished before `before`.
    pub async fn purge_terminal_before(&self, before: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE state IN ('completed', 'failed_terminal') AND finished_at < ?",
        )
        .bind(to_millis(before))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count jobs per state. States with no jobs are reported as zero.
    pub async fn count_by_state(&self) -> StoreResult<HashMap<JobState, u64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*) FROM jobs GROUP BY state",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<JobState, u64> =
            JobState::ALL.into_iter().map(|state| (state, 0)).collect();
        for (state, count) in rows {
            let state = state
                .parse::<JobState>()
                .map_err(|e| JobStoreError::Corrupt(e.to_string()))?;
            counts.insert(state, count.max(0) as u64);
        }
        Ok(counts)
    }

    /// Turn the outcome of a fenced acknowledgement into a result.
    ///
    /// When no row matched, the current row decides the error: missing,
    /// already terminal, or leased to someone else.
    async fn acknowledged(&self, id: JobId, row: Option<JobRow>) -> StoreResult<Job> {
        if let Some(row) = row {
            return row.try_into();
        }
        match self.find_by_id(id).await? {
            None => Err(JobStoreError::NotFound(id)),
            Some(job) if job.state.is_terminal() => Err(JobStoreError::AlreadyAcked(id)),
            Some(_) => Err(JobStoreError::LeaseExpired(id)),
        }
    }
}
