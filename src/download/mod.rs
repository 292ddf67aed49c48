//! Resumable HTTP transfer engine.
//!
//! This module moves single remote files to local paths:
//!
//! - [`HttpClient::probe`] learns size, filename, media type and resume
//!   support with a `HEAD` request
//! - [`HttpClient::transfer`] streams the body into `<destination>.part`,
//!   resumes with byte ranges, retries under a [`RetryPolicy`] and renames
//!   the file into place on success
//! - [`ProgressTracker`] reports bytes as they land, with one terminal event
//!   per transfer
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use fetchpool_core::download::{HttpClient, Progress};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let info = client.probe_or_unknown("https://example.com/big.iso").await;
//! let result = client
//!     .transfer(
//!         "https://example.com/big.iso",
//!         Path::new("./downloads/big.iso"),
//!         Some(info),
//!         Arc::new(|p: &Progress| {
//!             if let Some(warning) = &p.warning {
//!                 eprintln!("warning: {warning}");
//!             }
//!         }),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{} bytes in {} attempts", result.bytes_written, result.attempts);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod filename;
mod probe;
mod progress;
mod retry;

pub use client::{ClientOptions, HttpClient, TransferResult};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, DEFAULT_PROGRESS_INTERVAL, DEFAULT_RETRY_DELAY,
    PARTIAL_SUFFIX, READ_TIMEOUT_SECS,
};
pub use error::{DownloadError, StreamFailure};
pub use filename::{is_partial_path, partial_path, sanitize_filename};
pub use probe::RemoteFileInfo;
pub use progress::{Progress, ProgressCallback, ProgressTracker, ProgressWriter};
pub use retry::{FailureType, RetryBudget, RetryDecision, RetryPolicy, classify_error};

pub(crate) use client::set_file_mtime;
pub(crate) use filename::filename_from_url;

// Note: no module-local Result alias.
// Use `Result<T, DownloadError>` explicitly in function signatures.
