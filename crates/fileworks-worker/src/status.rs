//! Keeps file record status in step with job outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing;

use fileworks_core::result::AppResult;
use fileworks_core::types::id::FileId;
use fileworks_database::repositories::file::FileRepository;
use fileworks_entity::file::{ExtractedData, FileStatus, ProcessedFileInfo, StatusChange};

/// Statuses a record may be repaired from during reconciliation.
pub const NON_TERMINAL: &[FileStatus] = &[FileStatus::Uploaded, FileStatus::Processing];

/// Write boundary to the file record store.
///
/// Each call must apply the status and the extracted data together, and
/// only if the record is currently in one of `allowed_from`.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug + 'static {
    /// Conditionally move a record to `status`.
    async fn update_status(
        &self,
        file_id: FileId,
        status: FileStatus,
        extracted_data: Option<&ExtractedData>,
        allowed_from: &[FileStatus],
    ) -> AppResult<StatusChange>;
}

#[async_trait]
impl RecordStore for FileRepository {
    async fn update_status(
        &self,
        file_id: FileId,
        status: FileStatus,
        extracted_data: Option<&ExtractedData>,
        allowed_from: &[FileStatus],
    ) -> AppResult<StatusChange> {
        FileRepository::update_status(self, file_id, status, extracted_data, allowed_from).await
    }
}

/// Applies job lifecycle events to file records.
#[derive(Debug, Clone)]
pub struct StatusSynchronizer {
    records: Arc<dyn RecordStore>,
}

impl StatusSynchronizer {
    /// Create a new synchronizer over a record store.
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// A worker claimed the file's job: mark the record `processing`.
    ///
    /// A record that already reached a terminal status is left alone.
    pub async fn on_claim(&self, file_id: FileId) -> AppResult<StatusChange> {
        let change = self
            .transition(file_id, FileStatus::Processing, None, None)
            .await?;
        if let StatusChange::Skipped { current } = &change {
            tracing::debug!(
                file_id = %file_id,
                current = %current,
                "Record already terminal; not moving back to processing"
            );
        }
        Ok(change)
    }

    /// The job completed: store the extracted data with status `processed`.
    pub async fn on_success(
        &self,
        file_id: FileId,
        info: &ProcessedFileInfo,
    ) -> AppResult<StatusChange> {
        let data = ExtractedData::Processed(info.clone());
        self.transition(file_id, FileStatus::Processed, Some(&data), None)
            .await
    }

    /// The job failed terminally: store the error with status `failed`.
    pub async fn on_terminal_failure(
        &self,
        file_id: FileId,
        error_message: &str,
    ) -> AppResult<StatusChange> {
        let data = ExtractedData::failure(error_message);
        self.transition(file_id, FileStatus::Failed, Some(&data), None)
            .await
    }

    /// An attempt failed but will be retried. The record stays `processing`.
    pub fn on_retryable_failure(&self, file_id: FileId, attempt: u32, error_message: &str) {
        tracing::trace!(
            file_id = %file_id,
            attempt,
            error = error_message,
            "Retryable failure; record left as processing"
        );
    }

    /// Re-apply a terminal outcome to a record that never received it.
    ///
    /// Only records still `uploaded` or `processing` are touched.
    pub async fn repair(&self, file_id: FileId, outcome: &ExtractedData) -> AppResult<StatusChange> {
        let status = match outcome {
            ExtractedData::Processed(_) => FileStatus::Processed,
            ExtractedData::Failed(_) => FileStatus::Failed,
        };
        self.transition(file_id, status, Some(outcome), Some(NON_TERMINAL))
            .await
    }

    async fn transition(
        &self,
        file_id: FileId,
        status: FileStatus,
        extracted_data: Option<&ExtractedData>,
        allowed_from: Option<&[FileStatus]>,
    ) -> AppResult<StatusChange> {
        let allowed_from = allowed_from.unwrap_or_else(|| status.allowed_predecessors());
        let change = self
            .records
            .update_status(file_id, status, extracted_data, allowed_from)
            .await?;
        if change.is_applied() {
            tracing::debug!(file_id = %file_id, status = %status, "File status updated");
        }
        Ok(change)
    }
}
