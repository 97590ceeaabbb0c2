//! Worker pool: concurrent loops that claim, execute, and settle jobs.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time;
use tracing;
use uuid::Uuid;

use fileworks_core::config::WorkerConfig;
use fileworks_core::error::AppError;
use fileworks_database::error::JobStoreError;
use fileworks_entity::file::{ExtractedData, ProcessedFileInfo};
use fileworks_entity::job::JobKind;

use crate::executor::{JobExecutionError, JobExecutor};
use crate::queue::{ClaimedJob, JobQueue, NackOutcome};
use crate::status::StatusSynchronizer;

/// Pool of concurrent workers consuming the job queue
#[derive(Debug)]
pub struct WorkerPool {
    /// Job queue for claiming and settling
    queue: Arc<JobQueue>,
    /// Job executor for dispatching
    executor: Arc<JobExecutor>,
    /// File record status updates
    status: Arc<StatusSynchronizer>,
    /// Worker configuration
    config: WorkerConfig,
    /// Prefix shared by this pool's worker ids
    instance_id: String,
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<JobExecutor>,
        status: Arc<StatusSynchronizer>,
        config: WorkerConfig,
    ) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let instance_id = format!("{}-{}", config.worker_id_prefix, &suffix[..8]);
        for kind in JobKind::ALL {
            if !executor.has_handler(kind) {
                tracing::warn!(kind = %kind, "No handler registered; jobs of this kind will fail");
            }
        }
        Self {
            queue,
            executor,
            status,
            config,
            instance_id,
        }
    }

    /// Identifier of worker `index` in this pool.
    pub fn worker_id(&self, index: usize) -> String {
        format!("{}-{index}", self.instance_id)
    }

    /// Run the pool until the cancel signal is received.
    ///
    /// On shutdown, workers stop claiming and in-flight jobs get up to the
    /// configured grace period to settle. Jobs still running after that keep
    /// their lease until it expires and are then reclaimed.
    pub async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            instance = %self.instance_id,
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            visibility_timeout_ms = self.config.visibility_timeout_ms,
            "Worker pool started"
        );

        let mut workers = JoinSet::new();
        for index in 0..self.config.concurrency {
            let pool = Arc::clone(&self);
            let worker_id = self.worker_id(index);
            workers.spawn(pool.worker_loop(worker_id, cancel.clone()));
        }

        while !*cancel.borrow() {
            if cancel.changed().await.is_err() {
                break;
            }
        }

        tracing::info!(
            instance = %self.instance_id,
            grace_seconds = self.config.shutdown_grace_seconds,
            "Worker pool shutting down; waiting for in-flight jobs"
        );

        let drained = time::timeout(self.config.shutdown_grace(), async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = workers.len(),
                "Shutdown grace period elapsed; abandoning in-flight jobs to lease expiry"
            );
            workers.abort_all();
        }

        tracing::info!(instance = %self.instance_id, "Worker pool shut down");
    }

    /// One worker: claim, execute, settle, repeat.
    async fn worker_loop(self: Arc<Self>, worker_id: String, mut cancel: watch::Receiver<bool>) {
        tracing::debug!(worker_id = %worker_id, "Worker started");

        loop {
            if *cancel.borrow() {
                break;
            }

            let processed = match self.process_next(&worker_id).await {
                Ok(processed) => processed,
                Err(e) => {
                    tracing::error!(worker_id = %worker_id, error = %e, "Failed to claim job");
                    false
                }
            };
            if processed {
                continue;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = time::sleep(self.config.poll_interval()) => {}
            }
        }

        tracing::debug!(worker_id = %worker_id, "Worker stopped");
    }

    /// Claim and fully handle one job as `worker_id`.
    ///
    /// Returns `Ok(false)` when no job was due. An error means the queue
    /// itself could not be reached; no job was claimed.
    pub async fn process_next(&self, worker_id: &str) -> Result<bool, AppError> {
        let Some(claimed) = self.queue.claim_next(worker_id).await? else {
            return Ok(false);
        };
        self.handle(worker_id, claimed).await;
        Ok(true)
    }

    async fn handle(&self, worker_id: &str, claimed: ClaimedJob) {
        let file_id = claimed.job.payload.file_id();
        tracing::info!(
            job_id = %claimed.id(),
            file_id = %file_id,
            worker_id,
            attempt = claimed.attempt(),
            max_attempts = claimed.job.max_attempts,
            "Processing job"
        );

        if let Err(e) = self.status.on_claim(file_id).await {
            let failure = if e.is_not_found() {
                JobExecutionError::Permanent(format!("File with ID {file_id} not found"))
            } else if e.kind.is_infrastructure() {
                JobExecutionError::Infrastructure(e)
            } else {
                JobExecutionError::Permanent(format!(
                    "File record {file_id} is unreadable: {}",
                    e.message
                ))
            };
            self.settle(&claimed, Err(failure)).await;
            return;
        }

        let outcome = self.executor.execute(&claimed.job).await;
        self.settle(&claimed, outcome).await;
    }

    /// Report the outcome of an attempt to the queue, then to the record.
    async fn settle(
        &self,
        claimed: &ClaimedJob,
        outcome: Result<ProcessedFileInfo, JobExecutionError>,
    ) {
        let job_id = claimed.id();
        let file_id = claimed.job.payload.file_id();

        match outcome {
            Ok(info) => {
                let result = serde_json::to_value(ExtractedData::Processed(info.clone())).ok();
                match self.queue.ack(job_id, claimed.token(), result.as_ref()).await {
                    Ok(_) => {
                        tracing::info!(job_id = %job_id, file_id = %file_id, "Job completed");
                        if let Err(e) = self.status.on_success(file_id, &info).await {
                            tracing::error!(
                                job_id = %job_id,
                                file_id = %file_id,
                                error = %e,
                                "Failed to record processed status"
                            );
                        }
                    }
                    Err(e) => self.log_lost_ack(claimed, &e),
                }
            }
            Err(JobExecutionError::Infrastructure(err)) => {
                tracing::warn!(
                    job_id = %job_id,
                    file_id = %file_id,
                    error = %err,
                    "Infrastructure failure; releasing job"
                );
                if let Err(e) = self
                    .queue
                    .release(job_id, claimed.token(), &err.message)
                    .await
                {
                    self.log_lost_ack(claimed, &e);
                }
            }
            Err(failure) => {
                let message = failure.message();
                match self
                    .queue
                    .nack(job_id, claimed.token(), &message, failure.is_retryable())
                    .await
                {
                    Ok(NackOutcome::Retrying { job, delay }) => {
                        tracing::warn!(
                            job_id = %job_id,
                            file_id = %file_id,
                            attempt = job.attempts,
                            max_attempts = job.max_attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %message,
                            "Job failed; retry scheduled"
                        );
                        self.status
                            .on_retryable_failure(file_id, job.attempts, &message);
                    }
                    Ok(NackOutcome::Terminal { job }) => {
                        tracing::error!(
                            job_id = %job_id,
                            file_id = %file_id,
                            attempts = job.attempts,
                            error = %message,
                            "Job failed permanently"
                        );
                        if let Err(e) = self.status.on_terminal_failure(file_id, &message).await {
                            tracing::error!(
                                job_id = %job_id,
                                file_id = %file_id,
                                error = %e,
                                "Failed to record failed status"
                            );
                        }
                    }
                    Err(e) => self.log_lost_ack(claimed, &e),
                }
            }
        }
    }

    fn log_lost_ack(&self, claimed: &ClaimedJob, err: &JobStoreError) {
        match err {
            JobStoreError::LeaseExpired(_) => tracing::warn!(
                job_id = %claimed.id(),
                lease_expires_at = %claimed.lease.expires_at,
                "Lease lost before the outcome was recorded; discarding it"
            ),
            other => tracing::error!(
                job_id = %claimed.id(),
                error = %other,
                "Failed to record job outcome"
            ),
        }
    }
}
