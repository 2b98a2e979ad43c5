//! Bounded retry policy for audit-critical writes
//!
//! A write whose failure must not silently lose an audit trail (the
//! loan deletion path) is wrapped in a `RetryPolicy`: a bounded number
//! of attempts with configurable backoff and jitter. Only transient
//! store errors are re-attempted; validation, not-found, and conflict
//! errors surface immediately.

use crate::types::LedgerError;
use std::time::Duration;
use tracing::warn;

/// Bounded-retry configuration
///
/// The default mirrors the deletion path's historical behavior: 5
/// attempts with a fixed 100 ms pause between them. Setting a
/// multiplier above 1.0 turns the schedule exponential; a nonzero
/// jitter factor spreads concurrent retriers apart.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be at least 1)
    pub max_attempts: u32,

    /// Pause before the first retry
    pub initial_backoff: Duration,

    /// Growth factor applied to the pause after each retry
    pub backoff_multiplier: f64,

    /// Fraction of the pause randomized in both directions (0.1 = ±10%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retries() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Pause before retry number `retry` (0-based)
    fn backoff(&self, retry: u32) -> Duration {
        let base =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        let jitter_range = base * self.jitter;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }

    /// Run an operation, re-attempting transient failures
    ///
    /// Retries are not distinguished from the original attempt in the
    /// resulting error: the caller sees only the last failure.
    ///
    /// # Errors
    ///
    /// Returns the operation's error as soon as it is non-transient, or
    /// the last transient error once all attempts are exhausted.
    pub fn run<T, F>(&self, operation: &str, mut f: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Result<T, LedgerError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_transient() || attempt == attempts {
                        return Err(err);
                    }
                    let pause = self.backoff(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "retrying after transient store failure"
                    );
                    last_error = Some(err);
                    std::thread::sleep(pause);
                }
            }
        }

        // Unreachable: the loop always returns on the final attempt.
        Err(last_error.unwrap_or_else(|| {
            LedgerError::transient(operation, "retry budget exhausted")
        }))
    }
}
