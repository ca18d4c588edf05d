//! Shared data models for the Layercut backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video records and their upload/matte lifecycle statuses
//! - Upload limits enforced at finalization
//! - List-view summaries

pub mod limits;
pub mod video;

// Re-export common types
pub use limits::{MAX_CLIP_SECONDS, MAX_UPLOAD_BYTES};
pub use video::{MatteStatus, UploadStatus, VideoId, VideoRecord, VideoSummary};
