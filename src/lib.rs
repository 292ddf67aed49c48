//! Fetchpool Core Library
//!
//! This library moves remote files to local disk reliably: transfers resume
//! from partial files, retry transient failures under a budget, and report
//! progress as bytes land. A bounded worker pool schedules many transfers
//! at once while producers enumerate what to fetch.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Probe, progress tracking, and the resumable transfer client
//! - [`pool`] - Bounded worker pool, completion tracking, and the reporter boundary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod pool;
mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use download::{
    ClientOptions, DEFAULT_MAX_RETRIES, DownloadError, FailureType, HttpClient, Progress,
    ProgressCallback, RemoteFileInfo, RetryDecision, RetryPolicy, TransferResult, classify_error,
};
pub use pool::{
    DEFAULT_CONCURRENCY, DownloadRequest, FilenameTemplate, NoopReporter, PoolError,
    PoolOptions, Reporter, SkipReason, TracingReporter, WorkerPool,
};
