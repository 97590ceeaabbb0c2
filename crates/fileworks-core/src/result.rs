//! Convenience result type alias for FileWorks.

use crate::error::AppError;

/// A specialized `Result` type for FileWorks operations.
pub type AppResult<T> = Result<T, AppError>;
