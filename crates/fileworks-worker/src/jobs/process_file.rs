//! `process-file` job handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing;

use fileworks_entity::file::ProcessedFileInfo;
use fileworks_entity::job::{Job, JobKind, JobPayload};

use crate::executor::{JobExecutionError, JobHandler};
use crate::pipeline::{PipelineError, ProcessingPipeline};

/// Runs the processing pipeline for an uploaded file
#[derive(Debug)]
pub struct ProcessFileJobHandler {
    /// The per-file pipeline
    pipeline: Arc<ProcessingPipeline>,
}

impl ProcessFileJobHandler {
    /// Create a new process-file job handler
    pub fn new(pipeline: Arc<ProcessingPipeline>) -> Self {
        Self { pipeline }
    }
}

impl From<PipelineError> for JobExecutionError {
    fn from(err: PipelineError) -> Self {
        if err.is_retryable() {
            JobExecutionError::Transient(err.to_string())
        } else {
            JobExecutionError::Permanent(err.to_string())
        }
    }
}

#[async_trait]
impl JobHandler for ProcessFileJobHandler {
    fn kind(&self) -> JobKind {
        JobKind::ProcessFile
    }

    async fn execute(&self, job: &Job) -> Result<ProcessedFileInfo, JobExecutionError> {
        let JobPayload::ProcessFile(payload) = &job.payload;

        let info = self.pipeline.run(&payload.file_path).await?;

        tracing::info!(
            job_id = %job.id,
            file_id = %payload.file_id,
            size = info.byte_size,
            hash = %info.content_hash,
            processing_ms = info.processing_duration_ms,
            "File processed"
        );
        Ok(info)
    }
}
