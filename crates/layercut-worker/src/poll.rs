//! Bounded polling utility.
//!
//! A fixed-count, fixed-interval poll loop with a tagged result, so
//! callers never reach for ad-hoc loop-exit flags.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Configuration for a poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of poll attempts.
    pub max_attempts: u32,
    /// Fixed wait before each attempt.
    pub interval: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            interval: Duration::from_secs(3),
            operation_name: "poll".to_string(),
        }
    }
}

impl PollConfig {
    /// Create a new poll config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the wait between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// What one poll attempt observed.
#[derive(Debug)]
pub enum PollStep<T, E> {
    /// The watched operation finished successfully.
    Done(T),
    /// The watched operation failed; stop polling.
    Fail(E),
    /// Not finished yet; keep polling.
    Pending,
}

/// Result of a whole poll loop.
#[derive(Debug)]
pub enum PollOutcome<T, E> {
    /// The watched operation finished within the budget.
    Completed(T),
    /// The watched operation failed before the budget ran out.
    Failed(E),
    /// The attempt budget was exhausted while still pending.
    Exhausted { attempts: u32 },
}

impl<T, E> PollOutcome<T, E> {
    /// Returns true if the operation completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed(_))
    }
}

/// Poll `op` until it reports a terminal step or the budget runs out.
///
/// Waits `config.interval` before every attempt, makes at most
/// `config.max_attempts` calls, and never retries past a `Done` or
/// `Fail` step.
pub async fn poll_until<T, E, F, Fut>(config: &PollConfig, mut op: F) -> PollOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PollStep<T, E>>,
{
    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.interval).await;

        match op(attempt).await {
            PollStep::Done(value) => return PollOutcome::Completed(value),
            PollStep::Fail(error) => return PollOutcome::Failed(error),
            PollStep::Pending => {
                debug!(
                    "{} attempt {}/{} still pending",
                    config.operation_name, attempt, config.max_attempts
                );
            }
        }
    }

    PollOutcome::Exhausted {
        attempts: config.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> PollConfig {
        PollConfig::new("test")
            .with_max_attempts(max_attempts)
            .with_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_completes_on_done() {
        let calls = AtomicU32::new(0);

        let outcome: PollOutcome<u32, String> = poll_until(&fast_config(10), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    PollStep::Pending
                } else {
                    PollStep::Done(42)
                }
            }
        })
        .await;

        assert!(matches!(outcome, PollOutcome::Completed(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_immediately_on_fail() {
        let calls = AtomicU32::new(0);

        let outcome: PollOutcome<u32, &str> = poll_until(&fast_config(10), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { PollStep::Fail("boom") }
        })
        .await;

        assert!(matches!(outcome, PollOutcome::Failed("boom")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_exact_budget() {
        let calls = AtomicU32::new(0);

        let outcome: PollOutcome<u32, String> = poll_until(&fast_config(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { PollStep::Pending }
        })
        .await;

        assert!(matches!(outcome, PollOutcome::Exhausted { attempts: 5 }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_one_based() {
        let seen = std::sync::Mutex::new(Vec::new());

        let _: PollOutcome<(), ()> = poll_until(&fast_config(3), |attempt| {
            seen.lock().unwrap().push(attempt);
            async { PollStep::Pending }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_default_budget_matches_provider_cadence() {
        let config = PollConfig::default();
        assert_eq!(config.max_attempts, 100);
        assert_eq!(config.interval, Duration::from_secs(3));
    }
}
