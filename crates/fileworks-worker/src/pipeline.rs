//! Per-job processing pipeline: read, hash, measure, transform.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use fileworks_core::config::ProcessingConfig;
use fileworks_core::error::ErrorKind;
use fileworks_core::traits::storage::StorageProvider;
use fileworks_entity::file::ProcessedFileInfo;

/// Failure of a pipeline run. No partial result is produced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// The stored bytes could not be found.
    #[error("File not found: {path}")]
    FileMissing {
        /// Path as given in the job payload.
        path: String,
    },

    /// The path cannot be resolved inside the storage root.
    #[error("Invalid file path {path}: {message}")]
    InvalidPath {
        /// Path as given in the job payload.
        path: String,
        /// Why it was rejected.
        message: String,
    },

    /// Reading the bytes failed for another reason.
    #[error("Failed to read {path}: {message}")]
    Io {
        /// Path as given in the job payload.
        path: String,
        /// Underlying error message.
        message: String,
    },

    /// The transformation step failed.
    #[error("Transformation failed: {0}")]
    Transform(String),
}

impl PipelineError {
    /// Whether another attempt could succeed.
    ///
    /// A missing file is retried: the upload may not be visible yet.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FileMissing { .. } | Self::Io { .. })
    }
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Reads stored bytes and produces [`ProcessedFileInfo`].
#[derive(Debug, Clone)]
pub struct ProcessingPipeline {
    /// Where uploaded bytes live.
    storage: Arc<dyn StorageProvider>,
    /// Simulated transformation settings.
    config: ProcessingConfig,
}

impl ProcessingPipeline {
    /// Create a new pipeline over a storage provider.
    pub fn new(storage: Arc<dyn StorageProvider>, config: ProcessingConfig) -> Self {
        Self { storage, config }
    }

    /// Run the pipeline for the file at `path`.
    pub async fn run(&self, path: &str) -> Result<ProcessedFileInfo, PipelineError> {
        let bytes = self.storage.read_bytes(path).await.map_err(|e| match e.kind {
            ErrorKind::NotFound => PipelineError::FileMissing {
                path: path.to_string(),
            },
            ErrorKind::Validation => PipelineError::InvalidPath {
                path: path.to_string(),
                message: e.message,
            },
            _ => PipelineError::Io {
                path: path.to_string(),
                message: e.message,
            },
        })?;

        let byte_size = bytes.len() as u64;
        let content_hash = tokio::task::spawn_blocking(move || content_hash(&bytes))
            .await
            .map_err(|e| PipelineError::Transform(format!("hashing task failed: {e}")))?;

        let started = Instant::now();
        tokio::time::sleep(self.simulated_delay(&content_hash)).await;
        let processing_duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            path,
            byte_size,
            hash = %content_hash,
            processing_duration_ms,
            "Pipeline finished"
        );

        Ok(ProcessedFileInfo {
            content_hash,
            byte_size,
            processing_duration_ms,
            processed_at: Utc::now(),
        })
    }

    /// Duration of the simulated transformation for a given digest.
    ///
    /// Spread across `[min, max]` using the leading digest bytes, so the
    /// same content always takes the same simulated time.
    fn simulated_delay(&self, hash: &str) -> Duration {
        let min = self.config.simulated_delay_min_ms;
        let span = self.config.simulated_delay_max_ms.saturating_sub(min);
        if span == 0 {
            return self.config.min_delay();
        }
        let seed = hash
            .get(..8)
            .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
            .unwrap_or(0);
        let offset = span.checked_add(1).map_or(seed, |modulus| seed % modulus);
        Duration::from_millis(min.saturating_add(offset))
    }
}
