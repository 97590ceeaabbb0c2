//! Retry, backoff, and terminal failure behavior.

mod helpers;

use std::time::Duration;

use chrono::Utc;

use fileworks_core::traits::storage::StorageProvider;
use fileworks_core::types::id::UserId;
use fileworks_entity::file::FileStatus;
use fileworks_entity::job::{BackoffPolicy, JobPayload, JobState};
use fileworks_worker::queue::EnqueueOptions;
use fileworks_worker::NackOutcome;

#[tokio::test]
async fn test_missing_file_fails_after_max_attempts() {
    let app = helpers::TestApp::new().await;
    let file = app
        .register_missing(UserId::new(), "uploads/never-written.bin")
        .await;

    assert!(app.pool.process_next("w-0").await.unwrap());
    let record = app.record(file.id).await;
    assert_eq!(record.status, FileStatus::Processing);
    assert!(record.extracted_data.is_none());

    let record = app.drive_until_terminal(file.id, Duration::from_secs(5)).await;
    assert_eq!(record.status, FileStatus::Failed);
    let message = record.error_message().expect("failure message");
    assert!(message.contains("File not found"));
    assert!(message.contains("uploads/never-written.bin"));

    let jobs = app.queue.jobs_for_file(file.id).await.unwrap();
    assert_eq!(jobs[0].state, JobState::FailedTerminal);
    assert_eq!(jobs[0].attempts, 3);
    assert!(jobs[0].finished_at.is_some());
}

#[tokio::test]
async fn test_late_upload_succeeds_on_retry() {
    let app = helpers::TestApp::new().await;
    let file = app
        .register_missing(UserId::new(), "uploads/arrives-late.bin")
        .await;

    assert!(app.pool.process_next("w-0").await.unwrap());
    app.storage
        .write("uploads/arrives-late.bin", bytes::Bytes::from_static(b"late"))
        .await
        .unwrap();

    let record = app.drive_until_terminal(file.id, Duration::from_secs(5)).await;
    assert_eq!(record.status, FileStatus::Processed);
    let jobs = app.queue.jobs_for_file(file.id).await.unwrap();
    assert_eq!(jobs[0].attempts, 2);
    assert_eq!(jobs[0].state, JobState::Completed);
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let app = helpers::TestApp::new().await;
    let payload = JobPayload::process_file(
        fileworks_core::types::id::FileId::new(),
        UserId::new(),
        "uploads/a.bin",
    );
    let options = EnqueueOptions {
        max_attempts: Some(3),
        backoff: Some(BackoffPolicy::exponential(Duration::from_millis(1000))),
        delay: None,
    };
    let job_id = app.queue.enqueue(payload, options).await.unwrap();

    let first = app.queue.claim_next("w-0").await.unwrap().unwrap();
    let outcome = app
        .queue
        .nack(job_id, first.token(), "transient", true)
        .await
        .unwrap();
    let NackOutcome::Retrying { job, delay } = outcome else {
        panic!("expected a retry");
    };
    assert_eq!(delay, Duration::from_millis(1000));
    assert_eq!((job.next_run_at - job.updated_at).num_milliseconds(), 1000);
    assert!(app.queue.claim_next("w-0").await.unwrap().is_none());

    let second = app
        .queue
        .claim_next_at("w-0", job.next_run_at)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.attempt(), 2);
    let outcome = app
        .queue
        .nack(job_id, second.token(), "transient", true)
        .await
        .unwrap();
    let NackOutcome::Retrying { job, delay } = outcome else {
        panic!("expected a retry");
    };
    assert_eq!(delay, Duration::from_millis(2000));
    assert_eq!((job.next_run_at - job.updated_at).num_milliseconds(), 2000);

    let third = app
        .queue
        .claim_next_at("w-0", job.next_run_at)
        .await
        .unwrap()
        .unwrap();
    let outcome = app
        .queue
        .nack(job_id, third.token(), "transient", true)
        .await
        .unwrap();
    assert!(outcome.is_terminal());
    assert_eq!(outcome.job().attempts, 3);
}

#[tokio::test]
async fn test_deleted_record_fails_job_without_retry() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();
    let file = app.upload(user, "short-lived.txt", b"bye").await;
    app.file_service.delete_for_user(user, file.id).await.unwrap();

    assert!(app.pool.process_next("w-0").await.unwrap());

    let jobs = app.queue.jobs_for_file(file.id).await.unwrap();
    assert_eq!(jobs[0].state, JobState::FailedTerminal);
    assert_eq!(jobs[0].attempts, 1);
    assert!(
        jobs[0]
            .last_error
            .as_deref()
            .unwrap_or_default()
            .contains("not found")
    );
}

#[tokio::test]
async fn test_retry_waits_for_backoff() {
    let app = helpers::TestApp::with_worker(fileworks_core::config::WorkerConfig {
        base_delay_ms: 60_000,
        ..helpers::fast_worker_config()
    })
    .await;
    let file = app.register_missing(UserId::new(), "uploads/slow.bin").await;

    assert!(app.pool.process_next("w-0").await.unwrap());
    assert!(!app.pool.process_next("w-0").await.unwrap());

    let jobs = app.queue.jobs_for_file(file.id).await.unwrap();
    assert_eq!(jobs[0].state, JobState::FailedRetryable);
    assert!(jobs[0].next_run_at > Utc::now() + chrono::Duration::seconds(50));
    assert_eq!(app.record(file.id).await.status, FileStatus::Processing);
}
