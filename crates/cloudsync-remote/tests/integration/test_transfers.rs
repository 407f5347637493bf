//! Upload, download and delete against a mock storage service

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use cloudsync_core::domain::entry::ContentHash;
use cloudsync_core::domain::tree::RemoteDirId;
use cloudsync_core::ports::remote_storage::IRemoteStorage;
use cloudsync_remote::RemoteError;

use crate::common::*;

fn dir_id(id: &str) -> RemoteDirId {
    RemoteDirId::new(id).unwrap()
}

#[tokio::test]
async fn test_upload_sends_multipart_fields() {
    let (server, storage) = setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/api/sync-upload"))
        .and(body_string_contains("name=\"filename\""))
        .and(body_string_contains("report.csv"))
        .and(body_string_contains("name=\"folder_id\""))
        .and(body_string_contains("name=\"path\""))
        .and(body_string_contains("q1/data"))
        .and(body_string_contains(TOKEN))
        .and(body_string_contains("a,b,c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha1": "03DE6C570BFE24BFC328CCD7CA46B76EADAF4334"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("report.csv");
    std::fs::write(&file, b"a,b,c").unwrap();

    let receipt = storage
        .upload(&token(), &dir_id("42"), "q1/data", &file)
        .await
        .unwrap();

    assert_eq!(
        receipt.content_hash,
        ContentHash::new("03de6c570bfe24bfc328ccd7ca46b76eadaf4334")
    );
}

#[tokio::test]
async fn test_upload_without_sha1_fails() {
    let (server, storage) = setup_remote_mock().await;
    mount_upload(&server, json!({"status": "stored"})).await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("x.txt");
    std::fs::write(&file, b"x").unwrap();

    let err = storage
        .upload(&token(), &dir_id("1"), "", &file)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_upload_unauthorized() {
    let (server, storage) = setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/api/sync-upload"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("x.txt");
    std::fs::write(&file, b"x").unwrap();

    let err = storage
        .upload(&token(), &dir_id("1"), "", &file)
        .await
        .unwrap_err();

    assert!(err
        .downcast_ref::<RemoteError>()
        .is_some_and(RemoteError::is_auth_failure));
}

#[tokio::test]
async fn test_download_returns_raw_bytes() {
    let (server, storage) = setup_remote_mock().await;
    let hash = "a9993e364706816aba3e25717850c26c9cd0d89d";
    Mock::given(method("GET"))
        .and(path("/api/sync-download"))
        .and(query_param("token", TOKEN))
        .and(query_param("sha1", hash))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let data = storage
        .download(&token(), &ContentHash::new(hash))
        .await
        .unwrap();

    assert_eq!(data, b"abc");
}

#[tokio::test]
async fn test_download_unknown_content() {
    let (server, storage) = setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/sync-download"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = storage
        .download(&token(), &ContentHash::new("0".repeat(40)))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_sends_form_fields() {
    let (server, storage) = setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/api/sync-delete"))
        .and(body_string_contains(format!("token={TOKEN}")))
        .and(body_string_contains("folder_id=42"))
        .and(body_string_contains("path=reports%2Fq1.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = storage
        .delete(&token(), &dir_id("42"), "reports/q1.csv")
        .await
        .unwrap();

    assert!(receipt.done);
}

#[tokio::test]
async fn test_delete_not_done_is_rejected() {
    let (server, storage) = setup_remote_mock().await;
    mount_delete(&server, json!({"done": false})).await;

    let err = storage
        .delete(&token(), &dir_id("1"), "gone.txt")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_delete_missing_done_is_rejected() {
    let (server, storage) = setup_remote_mock().await;
    mount_delete(&server, json!({})).await;

    let err = storage
        .delete(&token(), &dir_id("1"), "gone.txt")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Rejected(_))
    ));
}
