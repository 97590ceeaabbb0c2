//! Background job processing for FileWorks.
//!
//! This crate provides:
//! - A durable job queue with leases, fenced acknowledgements, and backoff
//! - A worker pool that claims jobs and reports outcomes
//! - The file processing pipeline (hash, size, simulated transformation)
//! - A status synchronizer that keeps file records in step with job outcomes
//! - Scheduled maintenance: lease expiry sweep, reconciliation, retention purge

pub mod executor;
pub mod jobs;
pub mod maintenance;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod status;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use maintenance::{Maintenance, ReconcileReport};
pub use pipeline::{PipelineError, ProcessingPipeline};
pub use queue::{ClaimedJob, EnqueueOptions, JobQueue, NackOutcome, QueueStats};
pub use retry::{RetryDecision, RetryScheduler};
pub use runner::WorkerPool;
pub use scheduler::{CronScheduler, MaintenanceTask};
pub use status::{RecordStore, StatusSynchronizer};
