//! Background-removal job driver.
//!
//! Drives one uploaded video from `Ready` to a terminal matte status:
//! submit to the inference provider, poll to a terminal state with a
//! bounded budget, download the result with bounded retry, republish it
//! through the storage gateway, and record the outcome.

pub mod adapters;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod poll;
pub mod transfer;

pub use adapters::{FirestoreRecords, PredictionApi, StoragePublisher};
pub use driver::{
    DriverConfig, MatteClaim, MatteDriver, MattingApi, ResultPublisher, TerminalOutcome,
    VideoRecords,
};
pub use error::{WorkerError, WorkerResult};
pub use poll::{poll_until, PollConfig, PollOutcome, PollStep};
pub use transfer::{download_with_retry, upload_and_publish, TransferConfig};
