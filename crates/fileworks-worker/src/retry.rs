//! Retry decisions for failed attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};

use fileworks_entity::job::Job;

/// What to do with a job whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt.
    Retry {
        /// Number of the attempt that will run next.
        next_attempt: u32,
        /// Backoff delay before it becomes claimable.
        delay: Duration,
        /// When it becomes claimable.
        run_at: DateTime<Utc>,
    },
    /// No further attempts; the job fails terminally.
    GiveUp,
}

/// Decides whether a failed job is retried, and when.
///
/// A job that has made `attempts` attempts is retried while
/// `attempts < max_attempts` and the failure is retryable, after
/// `backoff.delay_for_attempt(attempts)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryScheduler;

impl RetryScheduler {
    /// Create a new retry scheduler.
    pub fn new() -> Self {
        Self
    }

    /// Decide the fate of `job` after a failed attempt at `now`.
    pub fn decide(&self, job: &Job, retryable: bool, now: DateTime<Utc>) -> RetryDecision {
        if !retryable || !job.has_attempts_remaining() {
            return RetryDecision::GiveUp;
        }

        let delay = job.backoff.delay_for_attempt(job.attempts);
        RetryDecision::Retry {
            next_attempt: job.attempts + 1,
            delay,
            run_at: after(now, delay),
        }
    }
}

/// `now + delay`, saturating at the largest representable time.
pub(crate) fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
