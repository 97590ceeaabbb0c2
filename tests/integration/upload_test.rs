//! Upload intake, owner-scoped reads, reconciliation, and shutdown.

mod helpers;

use std::time::Duration;

use fileworks_core::types::id::UserId;
use fileworks_core::types::pagination::PageRequest;
use fileworks_entity::file::{ExtractedData, FileStatus, ProcessedFileInfo};
use fileworks_entity::job::JobState;

#[tokio::test]
async fn test_upload_returns_before_processing() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();

    let file = app.upload(user, "report.pdf", b"%PDF-1.7").await;
    assert_eq!(file.status, FileStatus::Uploaded);
    assert_eq!(file.title.as_deref(), Some("report.pdf"));
    assert!(file.extracted_data.is_none());

    let jobs = app.queue.jobs_for_file(file.id).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Waiting);
    assert_eq!(jobs[0].attempts, 0);
}

#[tokio::test]
async fn test_reads_are_scoped_to_owner() {
    let app = helpers::TestApp::new().await;
    let alice = UserId::new();
    let bob = UserId::new();

    let mine = app.upload(alice, "a.txt", b"alice").await;
    app.upload(alice, "b.txt", b"alice again").await;
    app.upload(bob, "c.txt", b"bob").await;
    app.drive_until_terminal(mine.id, Duration::from_secs(5)).await;

    let view = app.file_service.get_for_user(alice, mine.id).await.unwrap();
    assert_eq!(view.status, FileStatus::Processed);

    let err = app
        .file_service
        .get_for_user(bob, mine.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let page = app
        .file_service
        .list_for_user(alice, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 2);
    assert!(page.items.iter().all(|f| f.original_filename != "c.txt"));
}

#[tokio::test]
async fn test_reconcile_repairs_missed_record_update() {
    let app = helpers::TestApp::new().await;
    let file = app.upload(UserId::new(), "crash.bin", b"abc").await;

    // Ack the job without writing the record, as if the worker died in between.
    let claimed = app.queue.claim_next("w-0").await.unwrap().unwrap();
    let info = ProcessedFileInfo {
        content_hash: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into(),
        byte_size: 3,
        processing_duration_ms: 4,
        processed_at: chrono::Utc::now(),
    };
    let result = serde_json::to_value(ExtractedData::Processed(info.clone())).unwrap();
    app.queue
        .ack(claimed.id(), claimed.token(), Some(&result))
        .await
        .unwrap();
    assert_eq!(app.record(file.id).await.status, FileStatus::Uploaded);

    let report = app.maintenance.reconcile().await.unwrap();
    assert_eq!(report.repaired, 1);

    let record = app.record(file.id).await;
    assert_eq!(record.status, FileStatus::Processed);
    assert_eq!(
        record.extracted_data.unwrap().as_processed(),
        Some(&info)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_stops_claiming() {
    let app = helpers::TestApp::new().await;
    let workers = app.start_workers();
    tokio::time::sleep(Duration::from_millis(30)).await;
    workers.stop().await;

    let file = app.upload(UserId::new(), "after.txt", b"late").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(app.record(file.id).await.status, FileStatus::Uploaded);
    assert_eq!(app.queue.stats().await.unwrap().waiting, 1);
}

#[tokio::test]
async fn test_deleted_file_is_gone_for_owner() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();
    let file = app.upload(user, "gone.txt", b"x").await;

    app.file_service.delete_for_user(user, file.id).await.unwrap();
    assert!(app.file_service.get_for_user(user, file.id).await.is_err());
    assert!(app.file_service.delete_for_user(user, file.id).await.is_err());
}
