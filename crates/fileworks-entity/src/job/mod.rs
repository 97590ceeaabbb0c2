//! Background job domain entities.

pub mod backoff;
pub mod model;
pub mod payload;
pub mod state;

pub use backoff::{BackoffPolicy, BackoffStrategy};
pub use model::{CreateJob, Job, Lease};
pub use payload::{JobKind, JobPayload, ProcessFilePayload};
pub use state::JobState;
