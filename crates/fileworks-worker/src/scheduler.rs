//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use fileworks_core::config::WorkerConfig;
use fileworks_core::error::AppError;

use crate::maintenance::Maintenance;

/// Maintenance task triggered by a cron schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTask {
    /// Fail jobs whose final lease expired
    LeaseSweep,
    /// Re-apply terminal job outcomes to file records
    Reconcile,
    /// Delete terminal jobs past retention
    Purge,
}

impl MaintenanceTask {
    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::LeaseSweep => "lease_sweep",
            Self::Reconcile => "reconcile",
            Self::Purge => "purge",
        }
    }

    /// Run the task once
    pub async fn run(self, maintenance: &Maintenance) -> Result<(), AppError> {
        match self {
            Self::LeaseSweep => {
                let expired = maintenance.sweep_expired_leases().await?;
                tracing::debug!(expired, "Lease sweep finished");
            }
            Self::Reconcile => {
                let report = maintenance.reconcile().await?;
                tracing::debug!(
                    examined = report.examined,
                    repaired = report.repaired,
                    "Reconcile finished"
                );
            }
            Self::Purge => {
                let purged = maintenance.purge_terminal().await?;
                tracing::debug!(purged, "Purge finished");
            }
        }
        Ok(())
    }
}

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Maintenance operations the schedules trigger
    maintenance: Arc<Maintenance>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(maintenance: Arc<Maintenance>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            maintenance,
        })
    }

    /// Register all default scheduled tasks
    pub async fn register_default_tasks(&self, config: &WorkerConfig) -> Result<(), AppError> {
        self.register(MaintenanceTask::LeaseSweep, &config.maintenance_schedule)
            .await?;
        self.register(MaintenanceTask::Reconcile, &config.reconcile_schedule)
            .await?;
        self.register(MaintenanceTask::Purge, &config.purge_schedule)
            .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Run `task` on the given cron schedule
    pub async fn register(&self, task: MaintenanceTask, schedule: &str) -> Result<(), AppError> {
        let maintenance = Arc::clone(&self.maintenance);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let maintenance = Arc::clone(&maintenance);
            Box::pin(async move {
                tracing::debug!(task = task.name(), "Running scheduled task");
                if let Err(e) = task.run(&maintenance).await {
                    tracing::error!(task = task.name(), error = %e, "Scheduled task failed");
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid cron schedule '{}' for {}: {}",
                schedule,
                task.name(),
                e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add {} schedule: {}", task.name(), e))
        })?;

        tracing::info!(task = task.name(), schedule, "Registered scheduled task");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
