//! Job lifecycle state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fileworks_core::error::AppError;

/// State of a background job.
///
/// ```text
/// waiting → active → completed
///                  → failed_retryable → (due) → active …
///                  → failed_terminal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be claimed once `next_run_at` is due.
    Waiting,
    /// Leased by a worker.
    Active,
    /// Successfully completed.
    Completed,
    /// Failed; a retry is scheduled at `next_run_at`.
    FailedRetryable,
    /// Failed with no retries left.
    FailedTerminal,
}

impl JobState {
    /// All states, in lifecycle order.
    pub const ALL: [JobState; 5] = [
        Self::Waiting,
        Self::Active,
        Self::Completed,
        Self::FailedRetryable,
        Self::FailedTerminal,
    ];

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::FailedTerminal)
    }

    /// Return the state as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::FailedRetryable => "failed_retryable",
            Self::FailedTerminal => "failed_terminal",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown job state '{s}'")))
    }
}
