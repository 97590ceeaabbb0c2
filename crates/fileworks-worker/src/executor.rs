//! Job executor: dispatches jobs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing;

use fileworks_core::error::AppError;
use fileworks_entity::file::ProcessedFileInfo;
use fileworks_entity::job::{Job, JobKind};

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// The job kind this handler processes
    fn kind(&self) -> JobKind;

    /// Execute one attempt of the job
    async fn execute(&self, job: &Job) -> Result<ProcessedFileInfo, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, not retried
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, retried with backoff while attempts remain
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Infrastructure unavailable; the job is released without consuming the attempt
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] AppError),
}

impl JobExecutionError {
    /// Whether the failed attempt may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }

    /// The message persisted on the job and surfaced on the file record.
    pub fn message(&self) -> String {
        match self {
            Self::Permanent(msg) | Self::Transient(msg) => msg.clone(),
            Self::Infrastructure(err) => err.message.clone(),
        }
    }
}

/// Dispatches jobs to the appropriate handler based on kind
#[derive(Debug, Default)]
pub struct JobExecutor {
    /// Registered job handlers by kind
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let kind = handler.kind();
        tracing::info!(kind = %kind, "Registered job handler");
        self.handlers.insert(kind, handler);
    }

    /// Execute a job by dispatching to the correct handler
    pub async fn execute(&self, job: &Job) -> Result<ProcessedFileInfo, JobExecutionError> {
        let handler = self.handlers.get(&job.kind).ok_or_else(|| {
            JobExecutionError::Permanent(format!("No handler registered for job kind '{}'", job.kind))
        })?;

        tracing::debug!(
            job_id = %job.id,
            kind = %job.kind,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Executing job"
        );

        handler.execute(job).await
    }

    /// Check if a handler is registered for a job kind
    pub fn has_handler(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
