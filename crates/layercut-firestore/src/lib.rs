//! Firestore REST API client for the video record store.
//!
//! This crate provides:
//! - A typed `VideoRepository` over per-user video collections
//! - Guarded status transitions (update-time preconditions)
//! - Service account authentication via gcp_auth with token caching
//! - Field-masked merge updates and bounded retry

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod video_repo;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use video_repo::{BeginMatteOutcome, VideoRepository};
