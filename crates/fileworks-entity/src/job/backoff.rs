//! Retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles after every failed attempt.
    #[default]
    Exponential,
}

/// Backoff policy stored with each job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Growth strategy.
    #[serde(default)]
    pub strategy: BackoffStrategy,
    /// Delay after the first failed attempt.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl BackoffPolicy {
    /// Exponential backoff starting at `base`.
    pub fn exponential(base: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: base.as_millis() as u64,
            max_delay_ms: None,
        }
    }

    /// Constant backoff of `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay_ms: delay.as_millis() as u64,
            max_delay_ms: None,
        }
    }

    /// Cap every delay at `max`.
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay_ms = Some(max.as_millis() as u64);
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Exponential: `base * 2^(attempt - 1)`, so with a 1s base the retry
    /// after attempt 1 waits 1s and the retry after attempt 2 waits 2s.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                self.base_delay_ms.saturating_mul(factor)
            }
        };

        let ms = match self.max_delay_ms {
            Some(max) => ms.min(max),
            None => ms,
        };
        Duration::from_millis(ms)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(1000))
    }
}
