//! Hosted storage backend against a mock storage API.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipq_storage::{Publisher, StorageError, SupabaseStorage, SupabaseStorageConfig};

fn storage_for(server: &MockServer) -> SupabaseStorage {
    SupabaseStorage::new(SupabaseStorageConfig::new(server.uri(), "svc-key", "videos")).unwrap()
}

fn clip_file(dir: &TempDir) -> std::path::PathBuf {
    let file = dir.path().join("clip1.mp4");
    std::fs::write(&file, b"fake clip bytes").unwrap();
    file
}

#[tokio::test]
async fn upload_posts_object_with_upsert_and_returns_public_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/videos/outputs/job-1/clip1.mp4"))
        .and(header("apikey", "svc-key"))
        .and(header("authorization", "Bearer svc-key"))
        .and(header("content-type", "video/mp4"))
        .and(header("x-upsert", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "videos/outputs/job-1/clip1.mp4"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = storage_for(&server)
        .publish(&clip_file(&dir), "outputs/job-1/clip1.mp4")
        .await
        .unwrap();

    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/public/videos/outputs/job-1/clip1.mp4",
            server.uri()
        )
    );
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"fake clip bytes".to_vec());
}

#[tokio::test]
async fn upload_rejection_is_upload_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Payload too large"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = storage_for(&server)
        .publish(&clip_file(&dir), "outputs/job-1/clip1.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::UploadFailed(_)));
    assert!(err.to_string().contains("Payload too large"));
}

#[tokio::test]
async fn upload_of_missing_file_is_io_error_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = storage_for(&server)
        .publish(&dir.path().join("missing.mp4"), "outputs/x/clip1.mp4")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io(_)));
}

#[tokio::test]
async fn bucket_check_lists_one_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/list/videos"))
        .and(body_json(json!({"prefix": "", "limit": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    storage_for(&server).check_bucket().await.unwrap();
}

#[tokio::test]
async fn missing_bucket_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/list/videos"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Bucket not found"})))
        .mount(&server)
        .await;

    let err = storage_for(&server).check_bucket().await.unwrap_err();
    assert!(matches!(err, StorageError::BucketUnavailable(_)));
}
