//! Periodic maintenance: lease sweeps, record reconciliation, job purge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing;

use fileworks_core::result::AppResult;
use fileworks_entity::file::ExtractedData;
use fileworks_entity::job::{Job, JobState};

use crate::queue::JobQueue;
use crate::status::StatusSynchronizer;

/// Error stored on a job whose final attempt outlived its lease.
pub const LEASE_TIMEOUT_MESSAGE: &str = "Processing did not finish within the visibility timeout";

/// Fallback error for a terminally failed job without a recorded message.
const UNKNOWN_FAILURE_MESSAGE: &str = "Processing failed";

/// How many recently finished jobs one reconciliation pass inspects.
const RECONCILE_BATCH: u32 = 500;

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Files whose latest terminal job was inspected
    pub examined: usize,
    /// Records moved to their job's terminal outcome
    pub repaired: usize,
}

/// Housekeeping run by the cron scheduler
#[derive(Debug)]
pub struct Maintenance {
    queue: Arc<JobQueue>,
    status: Arc<StatusSynchronizer>,
    /// Terminal jobs older than this are purged
    retention: Duration,
}

impl Maintenance {
    /// Create a new maintenance runner
    pub fn new(queue: Arc<JobQueue>, status: Arc<StatusSynchronizer>, retention: Duration) -> Self {
        Self {
            queue,
            status,
            retention,
        }
    }

    /// Fail jobs whose lease expired on their last attempt.
    ///
    /// Expired leases with attempts left are simply reclaimed by the next
    /// poll. Jobs out of attempts would otherwise stay `active` forever.
    pub async fn sweep_expired_leases(&self) -> AppResult<usize> {
        let expired = self
            .queue
            .expire_exhausted_leases(LEASE_TIMEOUT_MESSAGE)
            .await?;

        for job in &expired {
            let file_id = job.payload.file_id();
            tracing::warn!(
                job_id = %job.id,
                file_id = %file_id,
                attempts = job.attempts,
                "Lease expired on final attempt; job failed"
            );
            if let Err(e) = self
                .status
                .on_terminal_failure(file_id, LEASE_TIMEOUT_MESSAGE)
                .await
            {
                tracing::error!(file_id = %file_id, error = %e, "Failed to record failed status");
            }
        }

        Ok(expired.len())
    }

    /// Re-apply terminal job outcomes to records that missed them.
    ///
    /// Covers a crash between the job ack and the record write. Only the
    /// newest terminal job per file counts, and files that still have a
    /// pending job are left to that job.
    pub async fn reconcile(&self) -> AppResult<ReconcileReport> {
        let finished = self
            .queue
            .finished_since(self.retention_cutoff(), RECONCILE_BATCH)
            .await?;

        let mut seen = HashSet::new();
        let mut report = ReconcileReport::default();

        for job in finished {
            let file_id = job.payload.file_id();
            if !seen.insert(file_id) {
                continue;
            }

            let jobs = self.queue.jobs_for_file(file_id).await?;
            if jobs.iter().any(|j| !j.state.is_terminal()) {
                continue;
            }
            report.examined += 1;

            let Some(outcome) = Self::outcome_of(&job) else {
                tracing::warn!(job_id = %job.id, "Completed job has no readable result; skipping");
                continue;
            };

            match self.status.repair(file_id, &outcome).await {
                Ok(change) if change.is_applied() => {
                    report.repaired += 1;
                    tracing::info!(
                        job_id = %job.id,
                        file_id = %file_id,
                        state = %job.state.as_str(),
                        "Reconciled file status with job outcome"
                    );
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(file_id = %file_id, "Record deleted; nothing to reconcile");
                }
                Err(e) => return Err(e),
            }
        }

        if report.repaired > 0 {
            tracing::info!(
                examined = report.examined,
                repaired = report.repaired,
                "Reconciliation finished"
            );
        }
        Ok(report)
    }

    /// Delete terminal jobs older than the retention window.
    pub async fn purge_terminal(&self) -> AppResult<u64> {
        let purged = self
            .queue
            .purge_finished_before(self.retention_cutoff())
            .await?;
        if purged > 0 {
            tracing::info!(purged, "Purged old terminal jobs");
        }
        Ok(purged)
    }

    /// Start of the retention window.
    fn retention_cutoff(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn outcome_of(job: &Job) -> Option<ExtractedData> {
        match job.state {
            JobState::Completed => job
                .result
                .clone()
                .and_then(|value| serde_json::from_value(value).ok()),
            JobState::FailedTerminal => Some(ExtractedData::failure(
                job.last_error.as_deref().unwrap_or(UNKNOWN_FAILURE_MESSAGE),
            )),
            _ => None,
        }
    }
}
