//! Upload intake: store bytes, create the record, and queue processing.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info};
use uuid::Uuid;

use fileworks_core::error::AppError;
use fileworks_core::traits::storage::StorageProvider;
use fileworks_core::types::id::UserId;
use fileworks_database::repositories::file::FileRepository;
use fileworks_entity::file::{CreateFileRecord, ExtractedData, FileStatus};
use fileworks_entity::job::JobPayload;
use fileworks_worker::queue::{EnqueueOptions, JobQueue};

use super::service::FileView;

/// Accepts uploads and hands them to the processing queue.
#[derive(Clone)]
pub struct UploadService {
    /// File repository.
    file_repo: Arc<FileRepository>,
    /// Where uploaded bytes are written.
    storage: Arc<dyn StorageProvider>,
    /// Processing job queue.
    queue: Arc<JobQueue>,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService").finish()
    }
}

/// Single-request upload with the full file body.
#[derive(Debug, Clone)]
pub struct UploadParams {
    /// Uploading user.
    pub user_id: UserId,
    /// File name as supplied by the client.
    pub file_name: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// File content bytes.
    pub data: Bytes,
}

/// An accepted upload. Processing continues in the background.
#[derive(Debug, Clone)]
pub struct RegisteredUpload {
    /// The new record, status `uploaded`.
    pub file: FileView,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        file_repo: Arc<FileRepository>,
        storage: Arc<dyn StorageProvider>,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            file_repo,
            storage,
            queue,
        }
    }

    /// Writes the bytes to storage, then registers the upload.
    pub async fn upload(&self, params: UploadParams) -> Result<RegisteredUpload, AppError> {
        let file_name = sanitize_file_name(&params.file_name)?;
        let storage_path = format!("uploads/{}-{}", Uuid::new_v4().simple(), file_name);

        self.storage
            .write(&storage_path, params.data.clone())
            .await
            .map_err(|e| AppError::storage(format!("Storage write failed: {}", e.message)))?;

        self.register(CreateFileRecord {
            user_id: params.user_id,
            original_filename: params.file_name,
            storage_path,
            title: params.title,
            description: params.description,
        })
        .await
    }

    /// Creates a record for already-stored bytes and queues its processing.
    ///
    /// Returns as soon as the job is durably queued. If queueing fails the
    /// record is marked `failed` so it never sits in `uploaded` with no job.
    pub async fn register(&self, data: CreateFileRecord) -> Result<RegisteredUpload, AppError> {
        if data.original_filename.trim().is_empty() {
            return Err(AppError::validation("File name must not be empty"));
        }

        let record = self.file_repo.create(&data).await?;
        let payload = JobPayload::process_file(record.id, record.user_id, &record.storage_path);

        if let Err(e) = self.queue.enqueue(payload, EnqueueOptions::default()).await {
            let err = AppError::from(e);
            error!(file_id = %record.id, error = %err, "Failed to queue file processing");
            let failure = ExtractedData::failure(format!("Failed to queue processing: {}", err.message));
            if let Err(mark) = self
                .file_repo
                .update_status(
                    record.id,
                    FileStatus::Failed,
                    Some(&failure),
                    FileStatus::Failed.allowed_predecessors(),
                )
                .await
            {
                error!(file_id = %record.id, error = %mark, "Failed to record failed status");
            }
            return Err(err);
        }

        info!(
            user_id = %record.user_id,
            file_id = %record.id,
            name = %record.original_filename,
            "Upload registered; processing queued"
        );

        Ok(RegisteredUpload {
            file: FileView::from(record),
        })
    }
}

/// Keep only the final path component of a client-supplied name.
fn sanitize_file_name(name: &str) -> Result<String, AppError> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(AppError::validation(format!("Invalid file name '{name}'")));
    }
    Ok(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileworks_core::config::WorkerConfig;
    use fileworks_database::DatabasePool;
    use fileworks_database::migration::run_migrations;
    use fileworks_database::repositories::job::JobRepository;
    use fileworks_entity::job::JobState;
    use fileworks_storage::LocalStorageProvider;

    struct Setup {
        service: UploadService,
        queue: Arc<JobQueue>,
        storage: Arc<LocalStorageProvider>,
        _dir: tempfile::TempDir,
    }

    async fn setup() -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let db = DatabasePool::connect_in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        let storage = Arc::new(
            LocalStorageProvider::new(dir.path().to_str().unwrap())
                .await
                .unwrap(),
        );
        let queue = Arc::new(JobQueue::new(
            Arc::new(JobRepository::new(db.pool().clone())),
            &WorkerConfig::default(),
        ));
        let service = UploadService::new(
            Arc::new(FileRepository::new(db.pool().clone())),
            storage.clone(),
            Arc::clone(&queue),
        );
        Setup {
            service,
            queue,
            storage,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_upload_stores_bytes_and_queues_job() {
        let s = setup().await;
        let registered = s
            .service
            .upload(UploadParams {
                user_id: UserId::new(),
                file_name: "../../notes.txt".into(),
                title: None,
                description: Some("weekly notes".into()),
                data: Bytes::from_static(b"hello"),
            })
            .await
            .unwrap();

        let file = registered.file;
        assert_eq!(file.status, FileStatus::Uploaded);
        assert_eq!(file.title.as_deref(), Some("../../notes.txt"));

        let jobs = s.queue.jobs_for_file(file.id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].state, JobState::Waiting);

        let JobPayload::ProcessFile(payload) = &jobs[0].payload;
        assert!(payload.file_path.starts_with("uploads/"));
        assert!(payload.file_path.ends_with("-notes.txt"));
        let stored = s.storage.read_bytes(&payload.file_path).await.unwrap();
        assert_eq!(&stored[..], b"hello");
    }

    #[tokio::test]
    async fn test_register_with_bad_path_marks_record_failed() {
        let s = setup().await;
        let user_id = UserId::new();
        let err = s
            .service
            .register(CreateFileRecord {
                user_id,
                original_filename: "a.bin".into(),
                storage_path: "../outside.bin".into(),
                title: None,
                description: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, fileworks_core::error::ErrorKind::Validation);
        assert_eq!(s.queue.stats().await.unwrap().pending(), 0);

        let page = s
            .service
            .file_repo
            .find_by_user(user_id, &fileworks_core::types::pagination::PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].status, FileStatus::Failed);
        assert!(
            page.items[0]
                .error_message()
                .unwrap()
                .starts_with("Failed to queue processing:")
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a/b/c.txt").unwrap(), "c.txt");
        assert_eq!(sanitize_file_name("C:\\x\\y.png").unwrap(), "y.png");
        assert!(sanitize_file_name("uploads/").is_err());
        assert!(sanitize_file_name("..").is_err());
    }
}
