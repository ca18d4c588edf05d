//! Video record models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Upload lifecycle status of the source clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Record created, client has not started transferring bytes yet
    #[default]
    PendingUpload,
    /// Client is transferring bytes to the presigned target
    Uploading,
    /// Source object is durably stored and playable
    Ready,
    /// Transfer failed; the record keeps the reason
    UploadFailed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::PendingUpload => "pending_upload",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Ready => "ready",
            UploadStatus::UploadFailed => "upload_failed",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_upload" => Some(UploadStatus::PendingUpload),
            "uploading" => Some(UploadStatus::Uploading),
            "ready" => Some(UploadStatus::Ready),
            "upload_failed" => Some(UploadStatus::UploadFailed),
            _ => None,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Background-removal lifecycle status of the derived matte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatteStatus {
    /// No matting has been requested
    #[default]
    NotStarted,
    /// A matting job is in flight
    Processing,
    /// Matte produced and published
    Completed,
    /// Matting failed; the record keeps the reason
    Failed,
}

impl MatteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatteStatus::NotStarted => "not_started",
            MatteStatus::Processing => "processing",
            MatteStatus::Completed => "completed",
            MatteStatus::Failed => "failed",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(MatteStatus::NotStarted),
            "processing" => Some(MatteStatus::Processing),
            "completed" => Some(MatteStatus::Completed),
            "failed" => Some(MatteStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatteStatus::Completed | MatteStatus::Failed)
    }
}

impl fmt::Display for MatteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One uploaded clip and its derived matte, as stored per user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Unique video ID
    pub video_id: VideoId,

    /// User ID (owner)
    pub user_id: String,

    /// CDN-facing URL of the original upload
    pub source_url: String,

    /// CDN-facing URL of the clip thumbnail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Upload lifecycle status
    #[serde(default)]
    pub upload_status: UploadStatus,

    /// Matte lifecycle status
    #[serde(default)]
    pub matte_status: MatteStatus,

    /// CDN-facing URL of the matte (set iff matte_status is Completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matte_url: Option<String>,

    /// Provider job handle for the in-flight or last matting job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matte_job_id: Option<String>,

    /// When the current matting job was submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matte_started_at: Option<DateTime<Utc>>,

    /// Error message (if upload or matting failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Clip duration in seconds
    #[serde(default)]
    pub duration_seconds: f64,

    /// Pixel width of the source clip
    #[serde(default)]
    pub width: u32,

    /// Pixel height of the source clip
    #[serde(default)]
    pub height: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a new record at the start of an upload.
    pub fn new(
        video_id: VideoId,
        user_id: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            video_id,
            user_id: user_id.into(),
            source_url: source_url.into(),
            thumbnail_url: None,
            upload_status: UploadStatus::PendingUpload,
            matte_status: MatteStatus::NotStarted,
            matte_url: None,
            matte_job_id: None,
            matte_started_at: None,
            error_message: None,
            duration_seconds: 0.0,
            width: 0,
            height: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the source upload as durably stored.
    pub fn ready(mut self) -> Self {
        self.upload_status = UploadStatus::Ready;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the matte as completed with its published URL.
    pub fn complete_matte(mut self, url: impl Into<String>) -> Self {
        self.matte_status = MatteStatus::Completed;
        self.matte_url = Some(url.into());
        self.error_message = None;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the matte as failed.
    pub fn fail_matte(mut self, error: impl Into<String>) -> Self {
        self.matte_status = MatteStatus::Failed;
        self.matte_url = None;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self
    }

    /// Check whether an in-flight matting job has been stuck for longer
    /// than `deadline_secs`.
    ///
    /// A record is stale only while `Processing`; terminal statuses never
    /// go stale regardless of age. Records without a recorded start fall
    /// back to `updated_at`.
    pub fn is_matte_stale(&self, deadline_secs: i64) -> bool {
        if self.matte_status != MatteStatus::Processing {
            return false;
        }

        let started = self.matte_started_at.unwrap_or(self.updated_at);
        (Utc::now() - started).num_seconds() > deadline_secs
    }
}

/// Summary of one video in the user's library (for the grid view).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoSummary {
    pub id: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub matte_status: MatteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matte_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&VideoRecord> for VideoSummary {
    fn from(record: &VideoRecord) -> Self {
        Self {
            id: record.video_id.to_string(),
            source_url: record.source_url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
            matte_status: record.matte_status,
            matte_url: record.matte_url.clone(),
            duration_seconds: record.duration_seconds,
            created_at: record.created_at,
        }
    }
}
