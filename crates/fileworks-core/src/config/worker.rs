//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Background job worker configuration.
///
/// The queue-facing options also accept their camelCase spelling
/// (`maxAttempts`, `baseDelayMs`, `visibilityTimeoutMs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker pool is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of concurrent workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Default maximum attempts per job (including the first).
    #[serde(default = "default_max_attempts", alias = "maxAttempts")]
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    #[serde(default = "default_base_delay_ms", alias = "baseDelayMs")]
    pub base_delay_ms: u64,
    /// How long a claimed job stays invisible to other workers, in milliseconds.
    #[serde(default = "default_visibility_timeout_ms", alias = "visibilityTimeoutMs")]
    pub visibility_timeout_ms: u64,
    /// Idle sleep between empty polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Prefix for worker identifiers (`{prefix}-{index}`).
    #[serde(default = "default_worker_id_prefix")]
    pub worker_id_prefix: String,
    /// Time allowed for in-flight jobs to finish on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Cron expression for the expired-lease sweep.
    #[serde(default = "default_maintenance_schedule")]
    pub maintenance_schedule: String,
    /// Cron expression for job/record reconciliation.
    #[serde(default = "default_reconcile_schedule")]
    pub reconcile_schedule: String,
    /// Cron expression for purging old terminal jobs.
    #[serde(default = "default_purge_schedule")]
    pub purge_schedule: String,
    /// How long terminal jobs are retained before purge, in hours.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            visibility_timeout_ms: default_visibility_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            worker_id_prefix: default_worker_id_prefix(),
            shutdown_grace_seconds: default_shutdown_grace(),
            maintenance_schedule: default_maintenance_schedule(),
            reconcile_schedule: default_reconcile_schedule(),
            purge_schedule: default_purge_schedule(),
            retention_hours: default_retention_hours(),
        }
    }
}

impl WorkerConfig {
    /// Base retry delay.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Lease visibility timeout.
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    /// Idle poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Terminal job retention window.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 {
            return Err(AppError::configuration(
                "worker.concurrency must be at least 1",
            ));
        }
        if self.max_attempts == 0 {
            return Err(AppError::configuration(
                "worker.max_attempts must be at least 1",
            ));
        }
        if self.visibility_timeout_ms == 0 {
            return Err(AppError::configuration(
                "worker.visibility_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_visibility_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_worker_id_prefix() -> String {
    "worker".to_string()
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_maintenance_schedule() -> String {
    "*/30 * * * * *".to_string()
}

fn default_reconcile_schedule() -> String {
    "0 */5 * * * *".to_string()
}

fn default_purge_schedule() -> String {
    "0 0 * * * *".to_string()
}

fn default_retention_hours() -> u64 {
    168
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_options_accepted() {
        let json = serde_json::json!({
            "concurrency": 8,
            "maxAttempts": 5,
            "baseDelayMs": 250,
            "visibilityTimeoutMs": 10000
        });
        let config: WorkerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay(), Duration::from_millis(250));
        assert_eq!(config.visibility_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = WorkerConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retention_saturates() {
        let config = WorkerConfig {
            retention_hours: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.retention(), Duration::from_secs(u64::MAX));
        assert_eq!(
            WorkerConfig::default().retention(),
            Duration::from_secs(168 * 3600)
        );
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let config = WorkerConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
