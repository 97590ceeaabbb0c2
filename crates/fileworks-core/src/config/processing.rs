//! Processing pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Settings for the per-file processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Lower bound of the simulated transformation step, in milliseconds.
    #[serde(default = "default_min_delay")]
    pub simulated_delay_min_ms: u64,
    /// Upper bound of the simulated transformation step, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub simulated_delay_max_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            simulated_delay_min_ms: default_min_delay(),
            simulated_delay_max_ms: default_max_delay(),
        }
    }
}

impl ProcessingConfig {
    /// A configuration with no simulated delay.
    pub fn immediate() -> Self {
        Self {
            simulated_delay_min_ms: 0,
            simulated_delay_max_ms: 0,
        }
    }

    /// Lower bound as a duration.
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_min_ms)
    }

    /// Validate the delay range.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.simulated_delay_min_ms > self.simulated_delay_max_ms {
            return Err(AppError::configuration(format!(
                "processing.simulated_delay_min_ms ({}) exceeds simulated_delay_max_ms ({})",
                self.simulated_delay_min_ms, self.simulated_delay_max_ms
            )));
        }
        Ok(())
    }
}

fn default_min_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    3000
}
