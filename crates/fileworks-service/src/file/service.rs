//! Owner-scoped file record queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use fileworks_core::error::AppError;
use fileworks_core::types::id::{FileId, UserId};
use fileworks_core::types::pagination::{PageRequest, PageResponse};
use fileworks_database::repositories::file::FileRepository;
use fileworks_entity::file::{ExtractedData, FileRecord, FileStatus};

/// A file record as returned to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    /// File ID.
    pub id: FileId,
    /// File name as uploaded.
    pub original_filename: String,
    /// Display title.
    pub title: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Processing status.
    pub status: FileStatus,
    /// Processing result or failure.
    pub extracted_data: Option<ExtractedData>,
    /// When the upload was accepted.
    pub uploaded_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileView {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            original_filename: record.original_filename,
            title: record.title,
            description: record.description,
            status: record.status,
            extracted_data: record.extracted_data,
            uploaded_at: record.uploaded_at,
            updated_at: record.updated_at,
        }
    }
}

/// Reads and deletes file records on behalf of their owner.
#[derive(Debug, Clone)]
pub struct FileService {
    /// File repository.
    file_repo: Arc<FileRepository>,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(file_repo: Arc<FileRepository>) -> Self {
        Self { file_repo }
    }

    /// Gets a single file. Files owned by someone else are reported as missing.
    pub async fn get_for_user(&self, user_id: UserId, file_id: FileId) -> Result<FileView, AppError> {
        self.file_repo
            .find_for_user(file_id, user_id)
            .await?
            .map(FileView::from)
            .ok_or_else(|| AppError::not_found("File not found"))
    }

    /// Lists the user's files, newest first.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<PageResponse<FileView>, AppError> {
        let records = self.file_repo.find_by_user(user_id, &page).await?;
        Ok(records.map(FileView::from))
    }

    /// Deletes a file record.
    ///
    /// Stored bytes are left in place; a job still queued for the file will
    /// fail when its status update finds no record.
    pub async fn delete_for_user(&self, user_id: UserId, file_id: FileId) -> Result<(), AppError> {
        if !self.file_repo.delete_for_user(file_id, user_id).await? {
            return Err(AppError::not_found("File not found"));
        }
        info!(user_id = %user_id, file_id = %file_id, "File deleted");
        Ok(())
    }
}
