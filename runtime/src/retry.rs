//! Retry loop for optimistic-concurrency conflicts.
//!
//! A read-modify-write against the record store reads a record with its
//! version and writes it back with that version as the expectation. When
//! another writer got there first the store rejects the write; the right
//! response is to read again and re-apply the mutation to the fresh value.
//! [`retry_conflicts`] runs that loop with bounded attempts and exponential
//! backoff. Errors the predicate does not classify as conflicts fail
//! immediately.
//!
//! # Example
//!
//! ```rust
//! use marquee_runtime::retry::{ConflictRetry, retry_conflicts};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = ConflictRetry::new(3, Duration::from_millis(5));
//!
//! let seats = retry_conflicts(
//!     &policy,
//!     || async { Ok::<_, String>(99) },
//!     |err: &String| err.contains("conflict"),
//! )
//! .await?;
//! assert_eq!(seats, 99);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded retry policy for conflicting writes.
///
/// # Default Values
///
/// - `max_retries`: 3 (four attempts in total)
/// - `initial_delay`: 10ms, doubling per retry
/// - `max_delay`: 500ms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRetry {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap for the doubling delay
    pub max_delay: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl ConflictRetry {
    /// Policy with the given retry count and initial delay.
    #[must_use]
    pub fn new(max_retries: usize, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based), doubling and capped.
    #[must_use]
    pub fn delay_for(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(u32::try_from(retry).unwrap_or(u32::MAX)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or the
/// policy's retries are exhausted.
///
/// # Errors
///
/// Returns the operation's error when `is_conflict` rejects it, or the last
/// conflict once `policy.max_retries` retries have been spent.
pub async fn retry_conflicts<F, Fut, T, E, P>(
    policy: &ConflictRetry,
    mut operation: F,
    is_conflict: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::debug!(retries = retry, "Write succeeded after conflict retry");
                }
                return Ok(value);
            }
            Err(err) if is_conflict(&err) && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    retry,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Write conflicted, re-reading and retrying"
                );
                sleep(delay).await;
                retry += 1;
            }
            Err(err) => {
                if is_conflict(&err) {
                    tracing::error!(retries = retry, error = %err, "Conflict retries exhausted");
                }
                return Err(err);
            }
        }
    }
}
