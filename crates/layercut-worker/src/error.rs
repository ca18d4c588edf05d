//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Driver invoked on a video outside the expected lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The inference job could not be enqueued.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The inference provider reported failure or cancellation. The
    /// message is the upstream error verbatim.
    #[error("{0}")]
    UpstreamFailed(String),

    /// The poll attempt budget ran out before a terminal state.
    #[error("Timed out: {0}")]
    UpstreamTimeout(String),

    /// A terminal success response carried no usable result URL.
    #[error("No result URL: {0}")]
    ExtractionFailed(String),

    /// The result fetch failed on every attempt.
    #[error("Download failed after {attempts} attempts: {last_error}")]
    DownloadExhausted { attempts: u32, last_error: String },

    /// Republishing the result to storage failed.
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] layercut_storage::StorageError),

    #[error("Record store error: {0}")]
    Firestore(#[from] layercut_firestore::FirestoreError),

    #[error("Matting API error: {0}")]
    Matting(#[from] layercut_matting::MattingError),
}

impl WorkerError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn submission_failed(msg: impl Into<String>) -> Self {
        Self::SubmissionFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// True for contract violations that should surface to the caller
    /// instead of being folded into a terminal `Failed` outcome.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, WorkerError::InvalidState(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::InvalidState(_) => "invalid_state",
            WorkerError::SubmissionFailed(_) => "submission_failed",
            WorkerError::UpstreamFailed(_) => "upstream_failed",
            WorkerError::UpstreamTimeout(_) => "upstream_timeout",
            WorkerError::ExtractionFailed(_) => "extraction_failed",
            WorkerError::DownloadExhausted { .. } => "download_exhausted",
            WorkerError::UploadFailed(_) => "upload_failed",
            WorkerError::Storage(_) => "storage",
            WorkerError::Firestore(_) => "record_store",
            WorkerError::Matting(_) => "matting_api",
        }
    }
}
