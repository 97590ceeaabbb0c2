//! Typed errors for job store operations.

use thiserror::Error;

use fileworks_core::error::{AppError, ErrorKind};
use fileworks_core::types::id::JobId;

/// Errors returned by the job store.
///
/// Acknowledgement failures are split so callers can tell a duplicate ack
/// apart from a lease that was lost to another worker.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// No job with this id exists.
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The job already reached a terminal state.
    #[error("Job {0} was already acknowledged")]
    AlreadyAcked(JobId),

    /// The caller's lease expired and the job was reclaimed or released.
    #[error("Lease on job {0} expired or was reclaimed by another worker")]
    LeaseExpired(JobId),

    /// The payload or options were rejected at enqueue time.
    #[error("Invalid job: {0}")]
    InvalidPayload(String),

    /// A persisted row could not be decoded.
    #[error("Corrupt job row: {0}")]
    Corrupt(String),

    /// The underlying database failed.
    #[error("Job store database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl JobStoreError {
    /// Whether the failure comes from the database rather than the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<JobStoreError> for AppError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(_) => AppError::not_found(err.to_string()),
            JobStoreError::AlreadyAcked(_) | JobStoreError::LeaseExpired(_) => {
                AppError::conflict(err.to_string())
            }
            JobStoreError::InvalidPayload(_) => AppError::validation(err.to_string()),
            JobStoreError::Corrupt(_) => AppError::internal(err.to_string()),
            JobStoreError::Database(e) => AppError::with_source(
                ErrorKind::Database,
                format!("Job store database error: {e}"),
                e,
            ),
        }
    }
}
