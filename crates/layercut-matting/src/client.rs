//! Prediction API HTTP client.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{MattingError, MattingResult};
use crate::types::{CreatePredictionRequest, Prediction, PredictionInput};

/// Pinned version of the video matting model.
pub const VIDEO_MATTING_VERSION: &str =
    "73d2128a371922d5d1abf0712a1d974be0e4e2358cc1218e4e34714767232bac";

/// Configuration for the matting client.
#[derive(Debug, Clone)]
pub struct MattingConfig {
    /// Base URL of the prediction API
    pub base_url: String,
    /// API token
    pub api_token: String,
    /// Model version to run
    pub model_version: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for submission
    pub max_retries: u32,
}

impl MattingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MattingResult<Self> {
        Ok(Self {
            base_url: std::env::var("MATTING_API_URL")
                .unwrap_or_else(|_| "https://api.replicate.com/v1".to_string()),
            api_token: std::env::var("MATTING_API_TOKEN")
                .map_err(|_| MattingError::config_error("MATTING_API_TOKEN not set"))?,
            model_version: std::env::var("MATTING_MODEL_VERSION")
                .unwrap_or_else(|_| VIDEO_MATTING_VERSION.to_string()),
            timeout: Duration::from_secs(
                std::env::var("MATTING_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("MATTING_API_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        })
    }
}

/// Client for the hosted background-removal provider.
#[derive(Clone)]
pub struct MattingClient {
    http: Client,
    config: MattingConfig,
}

impl MattingClient {
    /// Create a new matting client.
    pub fn new(config: MattingConfig) -> MattingResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MattingError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MattingResult<Self> {
        Self::new(MattingConfig::from_env()?)
    }

    /// Submit a matting job for a publicly fetchable source video.
    pub async fn create_prediction(&self, source_url: &str) -> MattingResult<Prediction> {
        let url = format!("{}/predictions", self.config.base_url);
        let request = CreatePredictionRequest {
            version: self.config.model_version.clone(),
            input: PredictionInput {
                input_video: source_url.to_string(),
            },
        };

        debug!(source_url, "Submitting matting prediction");

        let response = self
            .with_retry(|| async {
                self.http
                    .post(&url)
                    .bearer_auth(&self.config.api_token)
                    .json(&request)
                    .send()
                    .await
                    .map_err(MattingError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MattingError::request_failed(format!(
                "prediction API returned {}: {}",
                status, body
            )));
        }

        let prediction: Prediction = response
            .json()
            .await
            .map_err(|e| MattingError::InvalidResponse(e.to_string()))?;

        debug!(prediction_id = %prediction.id, "Prediction submitted");
        Ok(prediction)
    }

    /// Fetch the current state of a prediction.
    pub async fn get_prediction(&self, prediction_id: &str) -> MattingResult<Prediction> {
        let url = format!("{}/predictions/{}", self.config.base_url, prediction_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MattingError::request_failed(format!(
                "prediction API returned {}: {}",
                status, body
            )));
        }

        let prediction: Prediction = response
            .json()
            .await
            .map_err(|e| MattingError::InvalidResponse(e.to_string()))?;

        Ok(prediction)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MattingResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MattingResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Matting request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| MattingError::request_failed("Unknown error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PredictionStatus;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> MattingConfig {
        MattingConfig {
            base_url,
            api_token: "test-token".to_string(),
            model_version: VIDEO_MATTING_VERSION.to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        }
    }

    #[test]
    fn test_model_version_is_pinned() {
        let config = test_config("http://localhost".into());
        assert_eq!(config.model_version.len(), 64);
    }

    #[tokio::test]
    async fn test_create_prediction_posts_version_and_input() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predictions"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "version": VIDEO_MATTING_VERSION,
                "input": {"input_video": "https://cdn.example/videos/a.mp4"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p-1",
                "status": "starting"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MattingClient::new(test_config(server.uri())).unwrap();
        let prediction = client
            .create_prediction("https://cdn.example/videos/a.mp4")
            .await
            .unwrap();

        assert_eq!(prediction.id, "p-1");
        assert_eq!(prediction.status, PredictionStatus::Starting);
    }

    #[tokio::test]
    async fn test_create_prediction_surfaces_api_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predictions"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid version"))
            .mount(&server)
            .await;

        let client = MattingClient::new(test_config(server.uri())).unwrap();
        let result = client.create_prediction("https://cdn.example/a.mp4").await;

        match result {
            Err(MattingError::RequestFailed(msg)) => {
                assert!(msg.contains("422"));
                assert!(msg.contains("invalid version"));
            }
            other => panic!("expected RequestFailed, got {:?}", other.map(|p| p.id)),
        }
    }

    #[tokio::test]
    async fn test_get_prediction_reads_terminal_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/predictions/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "p-1",
                "status": "succeeded",
                "output": "https://provider.example/out.mp4"
            })))
            .mount(&server)
            .await;

        let client = MattingClient::new(test_config(server.uri())).unwrap();
        let prediction = client.get_prediction("p-1").await.unwrap();

        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert_eq!(
            prediction.output.as_ref().and_then(|o| o.first_url()),
            Some("https://provider.example/out.mp4")
        );
    }
}
