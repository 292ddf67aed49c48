//! Retry budgeting for transient transfer failures.
//!
//! This module provides the [`RetryPolicy`], [`RetryBudget`] and [`FailureType`]
//! types for classifying transfer errors and deciding whether another attempt
//! should be made.
//!
//! # Overview
//!
//! When an attempt fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - Temporary failures that may succeed on retry
//! - [`FailureType::StreamReset`] - The server reset the body stream mid-transfer
//! - [`FailureType::Permanent`] - Failures that won't succeed regardless of retries
//!
//! The policy then spends one try from the [`RetryBudget`] and waits a fixed
//! delay, except for a stream reset that grew the partial file on a resumable
//! server, which retries immediately without spending a try. Growth is
//! measured against the partial file's size when the attempt began, so a
//! server that ignores ranges and resets at the same point every time still
//! spends the budget.
//!
//! # Example
//!
//! ```
//! use fetchpool_core::download::{
//!     DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error,
//! };
//!
//! let policy = RetryPolicy::default();
//! let mut budget = policy.budget();
//! let error = DownloadError::http_status("https://example.com/file.jpg", 503);
//!
//! match policy.should_retry(&mut budget, classify_error(&error), 0, false) {
//!     RetryDecision::Retry { delay } => println!("retrying in {delay:?}"),
//!     RetryDecision::FreeRetry => println!("retrying now"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use super::error::StreamFailure;
use super::DownloadError;

/// Classification of transfer failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: 5xx server errors, connection refused, body stream broken off.
    Transient,

    /// HTTP/2 stream reset by the server mid-body. Retryable.
    StreamReset,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, invalid URL, rename failure, cancellation.
    Permanent,
}

impl FailureType {
    /// Returns true for failure types the retry loop may absorb.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay. One try was spent.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
    },

    /// Retry immediately without spending a try.
    FreeRetry,

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Remaining tries for one transfer (all attempts of one request share it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    tries_left: u32,
}

impl RetryBudget {
    /// Returns the number of attempts still allowed.
    #[must_use]
    pub fn tries_left(&self) -> u32 {
        self.tries_left
    }
}

/// Configuration for retry behavior with a fixed inter-retry delay.
///
/// # Default Values
///
/// - `max_retries`: 5 (so up to 6 attempts)
/// - `retry_delay`: 5 seconds
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    max_retries: u32,

    /// Fixed pause before each charged retry.
    retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    #[must_use]
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Creates a policy with a custom `max_retries`, using the default delay.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Returns the number of retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the pause between charged retries.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Starts a fresh budget of `max_retries + 1` tries.
    #[must_use]
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            tries_left: self.max_retries.saturating_add(1),
        }
    }

    /// Determines whether to retry a failed attempt, charging `budget` as needed.
    ///
    /// # Arguments
    ///
    /// * `budget` - Tries remaining for this transfer
    /// * `failure_type` - Classification of the failure
    /// * `gained` - Bytes the partial file grew past its size at attempt start
    /// * `can_resume` - Whether the server accepts byte-range requests
    #[instrument(skip(self, budget), fields(tries_left = budget.tries_left))]
    pub fn should_retry(
        &self,
        budget: &mut RetryBudget,
        failure_type: FailureType,
        gained: u64,
        can_resume: bool,
    ) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::StreamReset if gained > 0 && can_resume => {
                debug!(gained, "stream reset after forward progress, free retry");
                return RetryDecision::FreeRetry;
            }
            FailureType::StreamReset | FailureType::Transient => {}
        }

        budget.tries_left = budget.tries_left.saturating_sub(1);
        if budget.tries_left == 0 {
            debug!(max_retries = self.max_retries, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!(
                    "retry budget exhausted after {} retries",
                    self.max_retries
                ),
            };
        }

        debug!(
            tries_left = budget.tries_left,
            delay_ms = self.retry_delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay: self.retry_delay,
        }
    }
}

/// Classifies a transfer error into a failure type for retry decisions.
///
/// | Error | Type | Rationale |
/// |-------|------|-----------|
/// | HTTP 5xx | Transient | Server may recover |
/// | HTTP other | Permanent | Won't change on retry |
/// | Timeout | Transient | Network may recover |
/// | Network | Transient | Server may come back |
/// | Stream (reset) | StreamReset | Resume usually succeeds |
/// | Stream (other) | Transient | Resume may succeed |
/// | Write | Transient | Mid-stream failures are assumed recoverable |
/// | Io | Permanent | Local open/close/rename problem |
/// | InvalidUrl | Permanent | Won't succeed |
/// | Cancelled | Permanent | Caller asked to stop |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),

        DownloadError::Stream {
            kind: StreamFailure::Reset,
            ..
        } => FailureType::StreamReset,

        DownloadError::Timeout { .. }
        | DownloadError::Network { .. }
        | DownloadError::Stream { .. }
        | DownloadError::Write { .. } => FailureType::Transient,

        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::Cancelled { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    if (500..600).contains(&status) {
        FailureType::Transient
    } else {
        FailureType::Permanent
    }
}
