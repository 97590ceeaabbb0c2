//! Data extracted by the processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome payload stored on a file record alongside a terminal status.
///
/// Serialized without a tag: `{"hash", "size", "processingTimeMs",
/// "processedAt"}` on success, `{"error"}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedData {
    /// Successful processing result.
    Processed(ProcessedFileInfo),
    /// Terminal failure description.
    Failed(ProcessingFailure),
}

/// Metadata extracted from a successfully processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFileInfo {
    /// Lowercase hex SHA-256 digest of the full content.
    #[serde(rename = "hash")]
    pub content_hash: String,
    /// Content length in bytes.
    #[serde(rename = "size")]
    pub byte_size: u64,
    /// Duration of the transformation step.
    #[serde(rename = "processingTimeMs")]
    pub processing_duration_ms: u64,
    /// When processing finished.
    #[serde(rename = "processedAt")]
    pub processed_at: DateTime<Utc>,
}

/// Human-readable description of a terminal processing failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingFailure {
    /// Error message surfaced to the file owner.
    #[serde(rename = "error")]
    pub error_message: String,
}

impl ExtractedData {
    /// Build a failure payload.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failed(ProcessingFailure {
            error_message: message.into(),
        })
    }

    /// The success payload, if any.
    pub fn as_processed(&self) -> Option<&ProcessedFileInfo> {
        match self {
            Self::Processed(info) => Some(info),
            Self::Failed(_) => None,
        }
    }

    /// The failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Processed(_) => None,
            Self::Failed(failure) => Some(&failure.error_message),
        }
    }
}

impl From<ProcessedFileInfo> for ExtractedData {
    fn from(info: ProcessedFileInfo) -> Self {
        Self::Processed(info)
    }
}
