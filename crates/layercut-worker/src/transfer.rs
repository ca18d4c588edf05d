//! Result transfer helpers: bounded-retry download and republish.

use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use layercut_storage::StorageClient;

use crate::error::{WorkerError, WorkerResult};

/// Configuration for the result transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum download attempts.
    pub max_attempts: u32,
    /// Fixed wait between failed attempts.
    pub backoff: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Fetch bytes from a remote URL with bounded retry.
///
/// An attempt fails if the request errors or the response status is not
/// in the success range. After the last attempt the error carries the
/// last underlying failure.
pub async fn download_with_retry(
    http: &reqwest::Client,
    url: &str,
    config: &TransferConfig,
) -> WorkerResult<Bytes> {
    let mut last_error = String::new();

    for attempt in 1..=config.max_attempts {
        match try_download(http, url).await {
            Ok(bytes) => {
                info!(
                    url,
                    attempt,
                    size_mb = bytes.len() as f64 / 1_048_576.0,
                    "Downloaded result"
                );
                return Ok(bytes);
            }
            Err(e) => {
                warn!(
                    url,
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "Result download attempt failed"
                );
                last_error = e;

                if attempt < config.max_attempts {
                    tokio::time::sleep(config.backoff).await;
                }
            }
        }
    }

    Err(WorkerError::DownloadExhausted {
        attempts: config.max_attempts,
        last_error,
    })
}

async fn try_download(http: &reqwest::Client, url: &str) -> Result<Bytes, String> {
    let response = http.get(url).send().await.map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    response.bytes().await.map_err(|e| e.to_string())
}

/// Push bytes to a fresh owner-scoped upload target and return the
/// CDN-facing URL of the stored object.
pub async fn upload_and_publish(
    http: &reqwest::Client,
    storage: &StorageClient,
    bytes: Bytes,
    owner_id: &str,
    content_type: &str,
) -> WorkerResult<String> {
    let target = storage.issue_owner_target(owner_id, content_type).await?;

    let response = http
        .put(&target.upload_url)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(bytes)
        .send()
        .await
        .map_err(|e| WorkerError::upload_failed(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(WorkerError::upload_failed(format!(
            "storage returned {}: {}",
            status, body
        )));
    }

    let public_url = storage.cdn_url_from_object_url(&target.upload_url)?;
    info!(owner_id, key = %target.key, public_url = %public_url, "Republished result");

    Ok(public_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercut_storage::StorageConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> TransferConfig {
        TransferConfig {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    async fn storage_against(server: &MockServer) -> StorageClient {
        StorageClient::new(StorageConfig {
            endpoint_url: Some(server.uri()),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            bucket_name: "clips".to_string(),
            region: "auto".to_string(),
            cdn_base_url: "https://cdn.example".to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_succeeds_on_third_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"matte".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let bytes = download_with_retry(&http, &format!("{}/out.mp4", server.uri()), &fast_config())
            .await
            .unwrap();

        assert_eq!(bytes.as_ref(), b"matte");
    }

    #[tokio::test]
    async fn test_download_exhausts_and_reports_last_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let result =
            download_with_retry(&http, &format!("{}/out.mp4", server.uri()), &fast_config()).await;

        match result {
            Err(WorkerError::DownloadExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("502"), "got: {last_error}");
            }
            other => panic!("expected DownloadExhausted, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_download_fails_fast_on_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let result =
            download_with_retry(&http, &format!("{}/gone.mp4", server.uri()), &fast_config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_upload_and_publish_returns_cdn_url() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = storage_against(&server).await;
        let http = reqwest::Client::new();

        let url = upload_and_publish(&http, &storage, Bytes::from_static(b"matte"), "user-1", "video/mp4")
            .await
            .unwrap();

        assert!(url.starts_with("https://cdn.example/user-1/"), "got: {url}");
        assert!(url.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_upload_failure_carries_storage_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let storage = storage_against(&server).await;
        let http = reqwest::Client::new();

        let result = upload_and_publish(
            &http,
            &storage,
            Bytes::from_static(b"matte"),
            "user-1",
            "video/mp4",
        )
        .await;

        match result {
            Err(WorkerError::UploadFailed(msg)) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("AccessDenied"));
            }
            other => panic!("expected UploadFailed, got {:?}", other.err().map(|e| e.to_string())),
        }
    }
}
