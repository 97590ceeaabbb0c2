//! File record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fileworks_core::types::id::{FileId, UserId};

use super::extracted::ExtractedData;
use super::status::FileStatus;

/// Metadata for an uploaded file.
///
/// The processing core only ever mutates `status` and `extracted_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique file identifier.
    pub id: FileId,
    /// The uploading user.
    pub user_id: UserId,
    /// File name as supplied by the client.
    pub original_filename: String,
    /// Provider-relative path of the stored bytes.
    pub storage_path: String,
    /// Display title.
    pub title: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Processing status.
    pub status: FileStatus,
    /// Result of the last terminal processing outcome.
    pub extracted_data: Option<ExtractedData>,
    /// When the upload was accepted.
    pub uploaded_at: DateTime<Utc>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// The terminal failure message, if the record is `Failed`.
    pub fn error_message(&self) -> Option<&str> {
        self.extracted_data
            .as_ref()
            .and_then(|data| data.error_message())
    }
}

/// Result of a guarded status update.
#[derive(Debug, Clone)]
pub enum StatusChange {
    /// The record was in an allowed predecessor status and was updated.
    Applied(FileRecord),
    /// The record was left alone because it was already in `current`.
    Skipped {
        /// Status the record was found in.
        current: FileStatus,
    },
}

impl StatusChange {
    /// Whether the update was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileRecord {
    /// The uploading user.
    pub user_id: UserId,
    /// File name as supplied by the client.
    pub original_filename: String,
    /// Provider-relative path of the stored bytes.
    pub storage_path: String,
    /// Display title (defaults to the original file name).
    pub title: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}
