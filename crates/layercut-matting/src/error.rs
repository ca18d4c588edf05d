//! Matting client error types.

use thiserror::Error;

/// Result type for matting API operations.
pub type MattingResult<T> = Result<T, MattingError>;

/// Errors that can occur talking to the prediction API.
#[derive(Debug, Error)]
pub enum MattingError {
    #[error("Failed to configure matting client: {0}")]
    ConfigError(String),

    #[error("Prediction request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid prediction response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MattingError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MattingError::Network(_))
    }
}
