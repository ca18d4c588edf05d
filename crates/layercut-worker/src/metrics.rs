//! Driver metrics collection.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Terminal driver outcomes by result.
    pub const MATTE_JOBS_TOTAL: &str = "matte_jobs_total";

    /// Poll attempts spent per job.
    pub const MATTE_POLL_ATTEMPTS: &str = "matte_poll_attempts";
}

/// Record a terminal driver outcome.
pub fn record_outcome(outcome: &str) {
    counter!(
        names::MATTE_JOBS_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how many poll attempts a job consumed.
pub fn record_poll_attempts(attempts: u32) {
    histogram!(names::MATTE_POLL_ATTEMPTS).record(attempts as f64);
}
