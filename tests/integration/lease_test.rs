//! Lease expiry, exclusive claims, and durability across restarts.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fileworks_core::config::WorkerConfig;
use fileworks_core::types::id::{FileId, UserId};
use fileworks_database::JobStoreError;
use fileworks_database::repositories::JobRepository;
use fileworks_entity::file::FileStatus;
use fileworks_entity::job::{JobPayload, JobState};
use fileworks_worker::maintenance::LEASE_TIMEOUT_MESSAGE;
use fileworks_worker::queue::{EnqueueOptions, JobQueue};

fn payload(path: &str) -> JobPayload {
    JobPayload::process_file(FileId::new(), UserId::new(), path)
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed_and_stale_ack_rejected() {
    let app = helpers::TestApp::with_worker(WorkerConfig {
        visibility_timeout_ms: 50,
        ..helpers::fast_worker_config()
    })
    .await;
    let job_id = app
        .queue
        .enqueue(payload("uploads/a.bin"), EnqueueOptions::default())
        .await
        .unwrap();

    let crashed = app.queue.claim_next("w-0").await.unwrap().unwrap();
    assert!(app.queue.claim_next("w-1").await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let reclaimed = app.queue.claim_next("w-1").await.unwrap().unwrap();
    assert_eq!(reclaimed.id(), job_id);
    assert_eq!(reclaimed.attempt(), 2);
    assert_ne!(reclaimed.token(), crashed.token());

    let stale = app.queue.ack(job_id, crashed.token(), None).await;
    assert!(matches!(stale, Err(JobStoreError::LeaseExpired(_))));

    let job = app.queue.ack(job_id, reclaimed.token(), None).await.unwrap();
    assert_eq!(job.state, JobState::Completed);

    let again = app.queue.ack(job_id, reclaimed.token(), None).await;
    assert!(matches!(again, Err(JobStoreError::AlreadyAcked(_))));
}

#[tokio::test]
async fn test_exhausted_lease_fails_record() {
    let app = helpers::TestApp::with_worker(WorkerConfig {
        max_attempts: 1,
        visibility_timeout_ms: 30,
        ..helpers::fast_worker_config()
    })
    .await;
    let file = app
        .register_missing(UserId::new(), "uploads/hung.bin")
        .await;
    app.queue.claim_next("w-0").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(app.queue.claim_next("w-1").await.unwrap().is_none());
    assert_eq!(app.maintenance.sweep_expired_leases().await.unwrap(), 1);

    let record = app.record(file.id).await;
    assert_eq!(record.status, FileStatus::Failed);
    assert_eq!(record.error_message(), Some(LEASE_TIMEOUT_MESSAGE));
    assert_eq!(app.maintenance.sweep_expired_leases().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_are_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let db = helpers::connect_file(&dir.path().join("queue.db")).await;
    fileworks_database::migration::run_migrations(db.pool())
        .await
        .unwrap();
    let queue = Arc::new(JobQueue::new(
        Arc::new(JobRepository::new(db.pool().clone())),
        &WorkerConfig::default(),
    ));

    let mut expected = HashSet::new();
    for i in 0..40 {
        let id = queue
            .enqueue(payload(&format!("uploads/{i}.bin")), EnqueueOptions::default())
            .await
            .unwrap();
        expected.insert(id);
    }

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let queue = Arc::clone(&queue);
        tasks.push(tokio::spawn(async move {
            let worker_id = format!("w-{worker}");
            let mut claimed = Vec::new();
            while let Some(job) = queue.claim_next(&worker_id).await.unwrap() {
                claimed.push(job.id());
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(seen.insert(id), "job {id} claimed twice");
        }
    }
    assert_eq!(seen, expected);
    assert_eq!(queue.stats().await.unwrap().active, 40);
}

#[tokio::test]
async fn test_jobs_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fileworks.db");

    let file_id = {
        let app = helpers::TestApp::on_file(&path, helpers::fast_worker_config()).await;
        let file = app.upload(UserId::new(), "durable.txt", b"still here").await;
        app.db.close().await;
        file.id
    };

    let app = helpers::TestApp::on_file(&path, helpers::fast_worker_config()).await;
    let stats = app.queue.stats().await.unwrap();
    assert_eq!(stats.waiting, 1);

    let record = app.record(file_id).await;
    assert_eq!(record.status, FileStatus::Uploaded);

    let jobs = app.queue.jobs_for_file(file_id).await.unwrap();
    let JobPayload::ProcessFile(payload) = &jobs[0].payload;
    assert_eq!(payload.file_id, file_id);
    assert!(payload.file_path.ends_with("-durable.txt"));
    assert_eq!(jobs[0].max_attempts, 3);
}
