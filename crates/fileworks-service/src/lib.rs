//! # fileworks-service
//!
//! Service layer for FileWorks. Services accept uploads, hand them to the
//! job queue, and expose owner-scoped views of file records.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod file;

pub use file::{FileService, FileView, RegisteredUpload, UploadParams, UploadService};
