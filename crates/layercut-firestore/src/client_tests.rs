//! Tests for Firestore client functionality.

use std::time::Duration;

use serial_test::serial;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::retry::RetryConfig;

// =============================================================================
// Test Helpers
// =============================================================================

fn test_config(emulator_host: Option<String>) -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        emulator_host,
    }
}

async fn client_for(server: &MockServer) -> FirestoreClient {
    let host = server.uri().strip_prefix("http://").unwrap().to_string();
    FirestoreClient::new(test_config(Some(host))).await.unwrap()
}

fn documents_path(rest: &str) -> String {
    format!(
        "/v1/projects/test-project/databases/(default)/documents/{}",
        rest
    )
}

fn video_doc_body(doc_id: &str) -> serde_json::Value {
    serde_json::json!({
        "name": format!(
            "projects/test-project/databases/(default)/documents/users/u-1/videos/{}",
            doc_id
        ),
        "fields": {
            "source_url": {"stringValue": "https://cdn.example/u-1/abc/v.mp4"},
            "upload_status": {"stringValue": "ready"},
            "matte_status": {"stringValue": "not_started"},
            "created_at": {"timestampValue": "2026-01-01T00:00:00Z"},
            "updated_at": {"timestampValue": "2026-01-01T00:00:00Z"}
        },
        "createTime": "2026-01-01T00:00:00Z",
        "updateTime": "2026-01-01T00:00:01Z"
    })
}

// =============================================================================
// Error Type Tests
// =============================================================================

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_500() {
    let err = FirestoreError::from_http_status(500, "internal error");
    assert!(matches!(err, FirestoreError::ServerError(500, _)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_400() {
    let err = FirestoreError::from_http_status(400, "bad request");
    assert!(matches!(err, FirestoreError::RequestFailed(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_404() {
    let err = FirestoreError::from_http_status(404, "not found");
    assert!(matches!(err, FirestoreError::NotFound(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_412() {
    let err = FirestoreError::from_http_status(412, "updateTime mismatch");
    assert!(err.is_precondition_failed());
    assert!(!err.is_retryable());
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(
        FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
        Some(502)
    );
    assert_eq!(
        FirestoreError::NotFound("doc".into()).http_status(),
        Some(404)
    );
}

#[test]
fn test_error_retry_after_ms() {
    assert_eq!(FirestoreError::RateLimited(5000).retry_after_ms(), Some(5000));
    assert_eq!(
        FirestoreError::ServerError(500, "error".into()).retry_after_ms(),
        None
    );
}

// =============================================================================
// Client Tests (against a mock server via the emulator path)
// =============================================================================

#[tokio::test]
async fn test_get_document_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(documents_path("users/u-1/videos/v-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_doc_body("v-1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client
        .get_document("users/u-1/videos", "v-1")
        .await
        .unwrap()
        .expect("document should exist");

    assert_eq!(doc.doc_id(), Some("v-1"));
    assert_eq!(
        doc.field::<String>("upload_status").as_deref(),
        Some("ready")
    );
}

#[tokio::test]
async fn test_get_document_missing_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(documents_path("users/u-1/videos/nope")))
        .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client.get_document("users/u-1/videos", "nope").await.unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn test_patch_guarded_maps_precondition_failure() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(documents_path("users/u-1/videos/v-1")))
        .respond_with(ResponseTemplate::new(412).set_body_string("updateTime mismatch"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut fields = std::collections::HashMap::new();
    fields.insert(
        "matte_status".to_string(),
        crate::types::Value::StringValue("processing".into()),
    );

    let result = client
        .patch_document_guarded(
            "users/u-1/videos",
            "v-1",
            fields,
            vec!["matte_status".to_string()],
            "2026-01-01T00:00:01Z",
        )
        .await;

    assert!(matches!(result, Err(ref e) if e.is_precondition_failed()));
}

#[tokio::test]
async fn test_list_documents_orders_and_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(documents_path("users/u-1/videos")))
        .and(query_param("orderBy", "created_at desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "documents": [video_doc_body("v-1"), video_doc_body("v-2")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let page = client
        .list_documents("users/u-1/videos", Some(100), None, Some("created_at desc"))
        .await
        .unwrap();

    let docs = page.documents.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_server_error_maps_to_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(documents_path("users/u-1/videos/v-1")))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client.get_document("users/u-1/videos", "v-1").await;

    assert!(matches!(result, Err(ref e) if e.is_retryable()));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_validates_empty_project_id() {
    std::env::set_var("GCP_PROJECT_ID", "");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    let result = FirestoreConfig::from_env();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_config_accepts_firebase_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "firebase-project");
    std::env::remove_var("FIREBASE_PROJECT_ID");
}

#[test]
#[serial]
fn test_config_handles_invalid_env_values() {
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
}
