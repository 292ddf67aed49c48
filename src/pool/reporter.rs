//! Lifecycle callbacks for pooled transfers.
//!
//! The pool calls a request's [`Reporter`] and never depends on what it does
//! with the events. Rendering (bars, logs, counters) lives behind this trait.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::request::DownloadRequest;
use super::template::TemplateError;
use crate::download::{DownloadError, Progress, TransferResult};

/// Why a request was not transferred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// Submitted after the pool was closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Dequeued after the pool was force-closed.
    #[error("pool was cancelled")]
    Cancelled,

    /// The destination file is already present.
    #[error("{} already exists", path.display())]
    AlreadyExists {
        /// Existing destination.
        path: PathBuf,
    },

    /// No filename could be derived from the request, probe or URL.
    #[error("could not determine a filename")]
    NoFilename,

    /// The filename template could not be rendered for this request.
    #[error("cannot render filename: {0}")]
    Template(TemplateError),

    /// The resolved name carries the suffix reserved for partial files.
    #[error("{name} uses the partial-file suffix")]
    ReservedName {
        /// Resolved name relative to the request folder.
        name: String,
    },

    /// The file is smaller than the configured minimum.
    #[error("size {size} is below the minimum of {min_size} bytes")]
    BelowMinimumSize {
        /// Known size of the file.
        size: u64,
        /// Configured minimum size.
        min_size: u64,
    },

    /// Preparing the destination failed.
    #[error("cannot prepare {}: {message}", path.display())]
    Io {
        /// Path that could not be prepared.
        path: PathBuf,
        /// Rendered IO error.
        message: String,
    },
}

/// Receives lifecycle events for a request.
///
/// A request gets either one `skip`, or one `start` followed by any number of
/// `progress` calls and one `end`. Calls come from worker tasks, so
/// implementations must be cheap and thread-safe. All methods default to
/// doing nothing.
pub trait Reporter: Send + Sync {
    /// The transfer to `destination` is starting.
    fn start(&self, _request: &DownloadRequest, _destination: &Path) {}

    /// Progress for a started transfer. Clone `progress` to keep it.
    fn progress(&self, _request: &DownloadRequest, _progress: &Progress) {}

    /// The request will not be transferred.
    fn skip(&self, _request: &DownloadRequest, _reason: &SkipReason) {}

    /// The transfer finished, successfully or not.
    fn end(&self, _request: &DownloadRequest, _result: &Result<TransferResult, DownloadError>) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Logs lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn start(&self, request: &DownloadRequest, destination: &Path) {
        info!(url = %request.url, path = %destination.display(), "download started");
    }

    fn progress(&self, request: &DownloadRequest, progress: &Progress) {
        if let Some(warning) = &progress.warning {
            warn!(url = %request.url, warning = %warning, "download hiccup");
        } else if !progress.done {
            debug!(
                url = %request.url,
                written = progress.written,
                total = ?progress.total,
                "download progress"
            );
        }
    }

    fn skip(&self, request: &DownloadRequest, reason: &SkipReason) {
        match reason {
            SkipReason::AlreadyExists { .. } | SkipReason::BelowMinimumSize { .. } => {
                debug!(url = %request.url, reason = %reason, "download skipped");
            }
            _ => warn!(url = %request.url, reason = %reason, "download skipped"),
        }
    }

    fn end(&self, request: &DownloadRequest, result: &Result<TransferResult, DownloadError>) {
        match result {
            Ok(done) => info!(
                url = %request.url,
                path = %done.path.display(),
                bytes = done.bytes_written,
                attempts = done.attempts,
                "download finished"
            ),
            Err(error) => warn!(url = %request.url, error = %error, "download failed"),
        }
    }
}
