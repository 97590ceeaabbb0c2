//! Storage provider trait for the file content boundary.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Trait for file storage backends.
///
/// Paths are provider-relative. `read_bytes` must report a missing object
/// with an [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) error
/// so callers can tell "missing" apart from I/O failures.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Read a file into memory as a complete byte buffer.
    async fn read_bytes(&self, path: &str) -> AppResult<Bytes>;

    /// Write bytes to a file at the given path.
    async fn write(&self, path: &str, data: Bytes) -> AppResult<()>;

    /// Check whether a file exists at the given path.
    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Delete a file at the given path. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;
}
