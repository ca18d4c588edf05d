//! S3-compatible object storage gateway.
//!
//! This crate provides:
//! - Presigned PUT upload targets scoped to an owner
//! - Byte uploads for server-side republishing
//! - CDN-facing URL derivation from object keys and bucket URLs

pub mod client;
pub mod error;

pub use client::{ClipUploadTargets, StorageClient, StorageConfig, UploadTarget};
pub use error::{StorageError, StorageResult};
