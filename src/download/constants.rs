//! Constants for the download module (timeouts, retry defaults, partial files).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes between body reads).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default fixed pause between retry attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default minimum interval between regular progress emits (unthrottled).
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::ZERO;

/// Suffix for in-progress files. Never treated as a finished artifact.
pub const PARTIAL_SUFFIX: &str = ".part";
