//! File services: upload intake and the owner-scoped read model.

pub mod service;
pub mod upload;

pub use service::{FileService, FileView};
pub use upload::{RegisteredUpload, UploadParams, UploadService};
