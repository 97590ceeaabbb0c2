//! End-to-end processing of uploaded files.

mod helpers;

use std::time::Duration;

use sha2::{Digest, Sha256};

use fileworks_core::types::id::UserId;
use fileworks_entity::file::FileStatus;
use fileworks_entity::job::JobState;

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_is_processed_by_running_pool() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();
    let data: Vec<u8> = (0..100u8).collect();

    let file = app.upload(user, "hundred.bin", &data).await;
    assert_eq!(file.status, FileStatus::Uploaded);

    let workers = app.start_workers();
    let record = app.wait_until_terminal(file.id, Duration::from_secs(10)).await;
    workers.stop().await;

    assert_eq!(record.status, FileStatus::Processed);
    let info = record
        .extracted_data
        .as_ref()
        .and_then(|d| d.as_processed())
        .expect("processed data");
    assert_eq!(info.byte_size, 100);
    assert_eq!(info.content_hash, sha256_hex(&data));
    assert_eq!(info.content_hash.len(), 64);

    let jobs = app.queue.jobs_for_file(file.id).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Completed);
    assert_eq!(jobs[0].attempts, 1);

    let stats = app.queue.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending(), 0);
}

#[tokio::test]
async fn test_processed_data_wire_shape() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();
    let file = app.upload(user, "hello.txt", b"hello").await;

    app.drive_until_terminal(file.id, Duration::from_secs(5)).await;

    let view = app.file_service.get_for_user(user, file.id).await.unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "processed");
    assert_eq!(
        json["extractedData"]["hash"],
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert_eq!(json["extractedData"]["size"], 5);
    assert!(json["extractedData"]["processingTimeMs"].is_u64());
    assert!(json["extractedData"]["processedAt"].is_string());
}

#[tokio::test]
async fn test_same_content_hashes_identically() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();
    let first = app.upload(user, "one.txt", b"same bytes").await;
    let second = app.upload(user, "two.txt", b"same bytes").await;

    let a = app.drive_until_terminal(first.id, Duration::from_secs(5)).await;
    let b = app.drive_until_terminal(second.id, Duration::from_secs(5)).await;

    let hash = |r: &fileworks_entity::file::FileRecord| {
        r.extracted_data
            .as_ref()
            .and_then(|d| d.as_processed())
            .map(|i| i.content_hash.clone())
    };
    assert!(hash(&a).is_some());
    assert_eq!(hash(&a), hash(&b));
}

#[tokio::test]
async fn test_empty_file() {
    let app = helpers::TestApp::new().await;
    let file = app.upload(UserId::new(), "empty.txt", b"").await;

    let record = app.drive_until_terminal(file.id, Duration::from_secs(5)).await;
    let info = record.extracted_data.unwrap().as_processed().cloned().unwrap();
    assert_eq!(info.byte_size, 0);
    assert_eq!(
        info.content_hash,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_uploads_all_complete() {
    let app = helpers::TestApp::new().await;
    let user = UserId::new();
    let mut ids = Vec::new();
    for i in 0..12u8 {
        let file = app.upload(user, &format!("f{i}.bin"), &[i; 32]).await;
        ids.push(file.id);
    }

    let workers = app.start_workers();
    for id in &ids {
        let record = app.wait_until_terminal(*id, Duration::from_secs(10)).await;
        assert_eq!(record.status, FileStatus::Processed);
    }
    workers.stop().await;

    for id in &ids {
        let jobs = app.queue.jobs_for_file(*id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].attempts, 1);
    }
}
