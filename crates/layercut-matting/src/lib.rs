//! Background-removal prediction API client.
//!
//! Speaks the hosted inference provider's predictions API: submit a video
//! matting job, then poll it to a terminal state. The ambiguous result
//! payload (string, object, or sequence) is normalized by
//! [`PredictionOutput::first_url`].

pub mod client;
pub mod error;
pub mod types;

pub use client::{MattingClient, MattingConfig};
pub use error::{MattingError, MattingResult};
pub use types::{Prediction, PredictionOutput, PredictionStatus};
