//! Background job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fileworks_core::types::id::JobId;

use super::backoff::BackoffPolicy;
use super::payload::{JobKind, JobPayload};
use super::state::JobState;

/// A persisted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Job kind, mirrored from the payload.
    pub kind: JobKind,
    /// Kind-specific payload.
    pub payload: JobPayload,
    /// Lifecycle state.
    pub state: JobState,
    /// Number of claims so far (started attempts).
    pub attempts: u32,
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Backoff policy applied between attempts.
    pub backoff: BackoffPolicy,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Result recorded on completion.
    pub result: Option<serde_json::Value>,
    /// Current lease, present while `Active`.
    pub lease: Option<Lease>,
    /// Earliest time the job may be claimed.
    pub next_run_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Check whether another attempt may be started.
    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Exclusive, time-bounded right of one worker to process a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Worker holding the lease.
    pub worker_id: String,
    /// Fencing token; every acknowledgement must present it.
    pub token: Uuid,
    /// When the lease runs out and the job becomes reclaimable.
    pub expires_at: DateTime<Utc>,
}

/// Data required to insert a new job.
#[derive(Debug, Clone)]
pub struct CreateJob {
    /// Kind-specific payload.
    pub payload: JobPayload,
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Backoff policy applied between attempts.
    pub backoff: BackoffPolicy,
    /// Earliest time the job may be claimed.
    pub run_at: DateTime<Utc>,
}
