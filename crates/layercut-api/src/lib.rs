//! Axum HTTP API server.
//!
//! This crate provides:
//! - Upload target issuance and upload finalization (which starts the
//!   background-removal driver)
//! - The user's video library endpoints
//! - Firebase ID token verification
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
