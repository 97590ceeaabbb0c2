//! Concrete repository implementations.

pub mod file;
pub mod job;

pub use file::FileRepository;
pub use job::JobRepository;

use chrono::{DateTime, Utc};

/// Encode a timestamp as Unix milliseconds for storage.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Decode a stored Unix-millisecond timestamp.
pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
