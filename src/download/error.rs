//! Error types for the download module.
//!
//! This module defines structured errors for all transfer operations,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// How a response body stream failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFailure {
    /// The server reset the HTTP/2 stream with `INTERNAL_ERROR`.
    ///
    /// Some hosts do this routinely on long-lived transfers; resuming usually works.
    Reset,
    /// Any other failure while reading the body.
    Other,
}

/// Errors that can occur during file transfers.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error before a response arrived (DNS, connection refused, TLS).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("server replied with HTTP {status} for {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body stream broke off mid-transfer.
    #[error("error downloading {url} after {written} bytes: {source}")]
    Stream {
        /// The URL being transferred.
        url: String,
        /// Bytes written by the failed attempt before the break.
        written: u64,
        /// Structured classification of the failure.
        kind: StreamFailure,
        /// The underlying body error.
        #[source]
        source: reqwest::Error,
    },

    /// Writing a received chunk to the partial file failed.
    #[error("error writing {path}: {source}")]
    Write {
        /// The partial file being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File system error opening, closing, or renaming the destination.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The transfer was aborted through its cancellation token.
    #[error("transfer of {url} was cancelled")]
    Cancelled {
        /// The URL whose transfer was cancelled.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a body stream error, classifying the failure from its source chain.
    pub fn stream(url: impl Into<String>, written: u64, source: reqwest::Error) -> Self {
        let kind = stream_failure_kind(&source);
        Self::Stream {
            url: url.into(),
            written,
            kind,
            source,
        }
    }

    /// Creates a mid-stream write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }
}

/// Walks the error's source chain looking for an HTTP/2 `INTERNAL_ERROR` reset.
fn stream_failure_kind(error: &reqwest::Error) -> StreamFailure {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(h2_error) = err.downcast_ref::<h2::Error>()
            && h2_error.reason() == Some(h2::Reason::INTERNAL_ERROR)
        {
            return StreamFailure::Reset;
        }
        current = err.source();
    }
    StreamFailure::Other
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs the
// url or path, which the source errors don't carry.
