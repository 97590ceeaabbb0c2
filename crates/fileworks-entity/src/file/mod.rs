//! File record domain entities.

pub mod extracted;
pub mod model;
pub mod status;

pub use extracted::{ExtractedData, ProcessedFileInfo, ProcessingFailure};
pub use model::{CreateFileRecord, FileRecord, StatusChange};
pub use status::FileStatus;
