//! Job queue: enqueue, lease-based claiming, and fenced acknowledgements.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing;
use uuid::Uuid;

use fileworks_core::config::WorkerConfig;
use fileworks_core::types::id::{FileId, JobId};
use fileworks_database::error::JobStoreError;
use fileworks_database::repositories::job::JobRepository;
use fileworks_entity::job::{BackoffPolicy, CreateJob, Job, JobKind, JobPayload, JobState, Lease};

use crate::retry::{RetryDecision, RetryScheduler, after};

/// Per-call overrides for a new job. Unset fields use the kind's defaults.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Maximum attempts, including the first.
    pub max_attempts: Option<u32>,
    /// Backoff between attempts.
    pub backoff: Option<BackoffPolicy>,
    /// Delay before the first attempt becomes claimable.
    pub delay: Option<Duration>,
}

/// A job leased to a worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    /// The job as it was when claimed.
    pub job: Job,
    /// The lease that fences acknowledgements.
    pub lease: Lease,
}

impl ClaimedJob {
    /// The job ID.
    pub fn id(&self) -> JobId {
        self.job.id
    }

    /// The attempt number this claim represents (1-based).
    pub fn attempt(&self) -> u32 {
        self.job.attempts
    }

    /// The lease token to present when acknowledging.
    pub fn token(&self) -> Uuid {
        self.lease.token
    }
}

/// Result of a negative acknowledgement.
#[derive(Debug, Clone)]
pub enum NackOutcome {
    /// Another attempt is scheduled.
    Retrying {
        /// The job in `failed_retryable` state.
        job: Job,
        /// Backoff before the next attempt.
        delay: Duration,
    },
    /// The job failed terminally.
    Terminal {
        /// The job in `failed_terminal` state.
        job: Job,
    },
}

impl NackOutcome {
    /// The job after the nack.
    pub fn job(&self) -> &Job {
        match self {
            Self::Retrying { job, .. } | Self::Terminal { job } => job,
        }
    }

    /// Whether the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs waiting for their first attempt or a release.
    pub waiting: u64,
    /// Jobs currently leased.
    pub active: u64,
    /// Completed jobs not yet purged.
    pub completed: u64,
    /// Jobs waiting for a retry.
    pub failed_retryable: u64,
    /// Terminally failed jobs not yet purged.
    pub failed_terminal: u64,
}

impl QueueStats {
    fn from_counts(counts: &HashMap<JobState, u64>) -> Self {
        let count = |state: JobState| counts.get(&state).copied().unwrap_or(0);
        Self {
            waiting: count(JobState::Waiting),
            active: count(JobState::Active),
            completed: count(JobState::Completed),
            failed_retryable: count(JobState::FailedRetryable),
            failed_terminal: count(JobState::FailedTerminal),
        }
    }

    /// Jobs that have not reached a terminal state.
    pub fn pending(&self) -> u64 {
        self.waiting + self.active + self.failed_retryable
    }
}

/// Durable job queue with at-least-once delivery.
///
/// A claim leases the job for the visibility timeout. If the holder neither
/// acks nor nacks before the lease runs out, the job becomes claimable again.
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Job repository for durable persistence
    repo: Arc<JobRepository>,
    /// Retry policy applied on nack
    retry: RetryScheduler,
    /// Default attempts for new jobs
    default_max_attempts: u32,
    /// Default backoff base for new jobs
    default_base_delay: Duration,
    /// Lease duration
    visibility_timeout: Duration,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(repo: Arc<JobRepository>, config: &WorkerConfig) -> Self {
        Self {
            repo,
            retry: RetryScheduler::new(),
            default_max_attempts: config.max_attempts,
            default_base_delay: config.base_delay(),
            visibility_timeout: config.visibility_timeout(),
        }
    }

    /// Lease duration handed out on claim.
    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Default attempts and backoff for a job kind.
    fn defaults_for(&self, kind: JobKind) -> (u32, BackoffPolicy) {
        match kind {
            JobKind::ProcessFile => (
                self.default_max_attempts,
                BackoffPolicy::exponential(self.default_base_delay),
            ),
        }
    }

    /// Enqueue a new job. Returns without waiting for it to run.
    pub async fn enqueue(
        &self,
        payload: JobPayload,
        options: EnqueueOptions,
    ) -> Result<JobId, JobStoreError> {
        payload
            .validate()
            .map_err(|e| JobStoreError::InvalidPayload(e.message))?;

        let (default_attempts, default_backoff) = self.defaults_for(payload.kind());
        let max_attempts = options.max_attempts.unwrap_or(default_attempts);
        if max_attempts == 0 {
            return Err(JobStoreError::InvalidPayload(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let data = CreateJob {
            payload,
            max_attempts,
            backoff: options.backoff.unwrap_or(default_backoff),
            run_at: after(now, options.delay.unwrap_or_default()),
        };
        let job = self.repo.create(&data, now).await?;

        tracing::info!(
            job_id = %job.id,
            kind = %job.kind,
            file_id = %job.payload.file_id(),
            max_attempts = job.max_attempts,
            "Enqueued job"
        );
        Ok(job.id)
    }

    /// Lease the next due job to `worker_id`, if any.
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, JobStoreError> {
        self.claim_next_at(worker_id, Utc::now()).await
    }

    /// Lease the next job due at `now`.
    pub async fn claim_next_at(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedJob>, JobStoreError> {
        let Some(job) = self
            .repo
            .claim_next(worker_id, self.visibility_timeout, now)
            .await?
        else {
            tracing::trace!(worker_id, "No due jobs");
            return Ok(None);
        };

        let lease = job.lease.clone().ok_or_else(|| {
            JobStoreError::Corrupt(format!("claimed job {} has no lease", job.id))
        })?;

        tracing::debug!(
            job_id = %job.id,
            worker_id,
            attempt = job.attempts,
            lease_expires_at = %lease.expires_at,
            "Claimed job"
        );
        Ok(Some(ClaimedJob { job, lease }))
    }

    /// Mark a leased job as completed.
    pub async fn ack(
        &self,
        job_id: JobId,
        lease_token: Uuid,
        result: Option<&serde_json::Value>,
    ) -> Result<Job, JobStoreError> {
        let job = self
            .repo
            .complete(job_id, lease_token, result, Utc::now())
            .await?;
        tracing::debug!(job_id = %job_id, "Job acknowledged");
        Ok(job)
    }

    /// Record a failed attempt and let the retry scheduler decide what's next.
    pub async fn nack(
        &self,
        job_id: JobId,
        lease_token: Uuid,
        error: &str,
        retryable: bool,
    ) -> Result<NackOutcome, JobStoreError> {
        let current = self
            .repo
            .find_by_id(job_id)
            .await?
            .ok_or(JobStoreError::NotFound(job_id))?;
        if current.state.is_terminal() {
            return Err(JobStoreError::AlreadyAcked(job_id));
        }

        let now = Utc::now();
        match self.retry.decide(&current, retryable, now) {
            RetryDecision::Retry { delay, run_at, .. } => {
                let job = self
                    .repo
                    .retry_later(job_id, lease_token, error, run_at, now)
                    .await?;
                Ok(NackOutcome::Retrying { job, delay })
            }
            RetryDecision::GiveUp => {
                let job = self
                    .repo
                    .fail_terminal(job_id, lease_token, error, now)
                    .await?;
                Ok(NackOutcome::Terminal { job })
            }
        }
    }

    /// Give a leased job back without consuming its attempt. It becomes
    /// claimable again after one base delay.
    pub async fn release(
        &self,
        job_id: JobId,
        lease_token: Uuid,
        error: &str,
    ) -> Result<Job, JobStoreError> {
        let now = Utc::now();
        let job = self
            .repo
            .release(
                job_id,
                lease_token,
                error,
                after(now, self.default_base_delay),
                now,
            )
            .await?;
        tracing::debug!(job_id = %job_id, next_run_at = %job.next_run_at, "Job released");
        Ok(job)
    }

    /// Look up a job.
    pub async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.repo.find_by_id(job_id).await
    }

    /// Every job enqueued for a file, oldest first.
    pub async fn jobs_for_file(&self, file_id: FileId) -> Result<Vec<Job>, JobStoreError> {
        self.repo.find_by_file(file_id).await
    }

    /// Move jobs whose lease expired on their final attempt to `failed_terminal`.
    pub async fn expire_exhausted_leases(&self, error: &str) -> Result<Vec<Job>, JobStoreError> {
        self.repo.expire_exhausted_leases(error, Utc::now()).await
    }

    /// Terminal jobs finished at or after `since`, newest first.
    pub async fn finished_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Job>, JobStoreError> {
        self.repo.find_terminal_since(since, limit).await
    }

    /// Delete terminal jobs finished before `before`.
    pub async fn purge_finished_before(&self, before: DateTime<Utc>) -> Result<u64, JobStoreError> {
        self.repo.purge_terminal_before(before).await
    }

    /// Get queue statistics
    pub async fn stats(&self) -> Result<QueueStats, JobStoreError> {
        let counts = self.repo.count_by_state().await?;
        Ok(QueueStats::from_counts(&counts))
    }
}
