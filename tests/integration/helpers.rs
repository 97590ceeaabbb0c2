//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use fileworks_core::config::{AppConfig, DatabaseConfig, ProcessingConfig, WorkerConfig};
use fileworks_core::types::id::{FileId, UserId};
use fileworks_database::DatabasePool;
use fileworks_database::repositories::{FileRepository, JobRepository};
use fileworks_entity::file::{CreateFileRecord, FileRecord};
use fileworks_service::{FileService, FileView, UploadParams, UploadService};
use fileworks_storage::LocalStorageProvider;
use fileworks_worker::jobs::ProcessFileJobHandler;
use fileworks_worker::{
    JobExecutor, JobQueue, Maintenance, ProcessingPipeline, StatusSynchronizer, WorkerPool,
};

/// Test application context
pub struct TestApp {
    /// Database pool for direct queries
    pub db: DatabasePool,
    /// File record repository
    pub files: Arc<FileRepository>,
    /// Job queue
    pub queue: Arc<JobQueue>,
    /// Storage rooted in a temp directory
    pub storage: Arc<LocalStorageProvider>,
    /// Upload intake
    pub uploads: UploadService,
    /// Owner-scoped read model
    pub file_service: FileService,
    /// Worker pool (not running until [`TestApp::start_workers`])
    pub pool: Arc<WorkerPool>,
    /// Scheduled maintenance operations
    pub maintenance: Arc<Maintenance>,
    /// Application config
    pub config: AppConfig,
    _storage_dir: TempDir,
}

/// Worker settings that keep retries and polling fast.
pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        base_delay_ms: 20,
        poll_interval_ms: 10,
        shutdown_grace_seconds: 5,
        ..WorkerConfig::default()
    }
}

impl TestApp {
    /// Create a new test application on a private in-memory database
    pub async fn new() -> Self {
        Self::with_worker(fast_worker_config()).await
    }

    /// Create a test application with custom worker settings
    pub async fn with_worker(worker: WorkerConfig) -> Self {
        let db = DatabasePool::connect_in_memory()
            .await
            .expect("Failed to open in-memory database");
        Self::build(db, worker).await
    }

    /// Create a test application backed by a database file
    pub async fn on_file(path: &Path, worker: WorkerConfig) -> Self {
        let db = connect_file(path).await;
        Self::build(db, worker).await
    }

    async fn build(db: DatabasePool, worker: WorkerConfig) -> Self {
        fileworks_database::migration::run_migrations(db.pool())
            .await
            .expect("Failed to run migrations");

        let config = AppConfig {
            worker,
            processing: ProcessingConfig::immediate(),
            ..AppConfig::default()
        };

        let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
        let storage = Arc::new(
            LocalStorageProvider::new(storage_dir.path().to_str().expect("utf-8 temp path"))
                .await
                .expect("Failed to init storage"),
        );

        let files = Arc::new(FileRepository::new(db.pool().clone()));
        let queue = Arc::new(JobQueue::new(
            Arc::new(JobRepository::new(db.pool().clone())),
            &config.worker,
        ));
        let status = Arc::new(StatusSynchronizer::new(files.clone()));

        let pipeline = Arc::new(ProcessingPipeline::new(
            storage.clone(),
            config.processing.clone(),
        ));
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(ProcessFileJobHandler::new(pipeline)));

        let pool = Arc::new(WorkerPool::new(
            Arc::clone(&queue),
            Arc::new(executor),
            Arc::clone(&status),
            config.worker.clone(),
        ));
        let maintenance = Arc::new(Maintenance::new(
            Arc::clone(&queue),
            status,
            config.worker.retention(),
        ));

        Self {
            uploads: UploadService::new(files.clone(), storage.clone(), Arc::clone(&queue)),
            file_service: FileService::new(files.clone()),
            db,
            files,
            queue,
            storage,
            pool,
            maintenance,
            config,
            _storage_dir: storage_dir,
        }
    }

    /// Upload bytes as a new file and return its record view
    pub async fn upload(&self, user_id: UserId, name: &str, data: &[u8]) -> FileView {
        self.uploads
            .upload(UploadParams {
                user_id,
                file_name: name.to_string(),
                title: None,
                description: None,
                data: Bytes::copy_from_slice(data),
            })
            .await
            .expect("Upload failed")
            .file
    }

    /// Register a record whose bytes were never stored
    pub async fn register_missing(&self, user_id: UserId, path: &str) -> FileView {
        self.uploads
            .register(CreateFileRecord {
                user_id,
                original_filename: "missing.bin".to_string(),
                storage_path: path.to_string(),
                title: None,
                description: None,
            })
            .await
            .expect("Register failed")
            .file
    }

    /// Load a record directly from the repository
    pub async fn record(&self, file_id: FileId) -> FileRecord {
        self.files
            .find_by_id(file_id)
            .await
            .expect("Failed to load record")
            .expect("Record missing")
    }

    /// Run the worker pool in the background
    pub fn start_workers(&self) -> RunningPool {
        let (cancel, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&self.pool).run(rx));
        RunningPool { cancel, handle }
    }

    /// Process due jobs on the calling task until the record is terminal
    pub async fn drive_until_terminal(&self, file_id: FileId, timeout: Duration) -> FileRecord {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            while self
                .pool
                .process_next("test-worker")
                .await
                .expect("Queue unavailable")
            {}
            let record = self.record(file_id).await;
            if record.status.is_terminal() {
                return record;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "file {file_id} still {} after {timeout:?}",
                record.status
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until the record reaches a terminal status
    pub async fn wait_until_terminal(&self, file_id: FileId, timeout: Duration) -> FileRecord {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let record = self.record(file_id).await;
            if record.status.is_terminal() {
                return record;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "file {file_id} still {} after {timeout:?}",
                record.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Handle to a background worker pool
pub struct RunningPool {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningPool {
    /// Signal shutdown and wait for the pool to drain
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("Worker pool did not stop")
            .expect("Worker pool panicked");
    }
}

/// Open (or create) a database file with several connections
pub async fn connect_file(path: &Path) -> DatabasePool {
    DatabasePool::connect(&DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: 8,
        connect_timeout_seconds: 10,
    })
    .await
    .expect("Failed to open database file")
}
