//! Bounded worker pool for scheduling transfers.
//!
//! A [`WorkerPool`] runs a fixed number of worker tasks that drain a
//! capacity-bounded queue of [`DownloadRequest`]s. Producers ("discovery"
//! tasks, typically scrapers enumerating an album) block in
//! [`submit`](WorkerPool::submit) while the queue is full.
//!
//! Two [`CompletionTracker`]s keep [`wait`](WorkerPool::wait) honest: one
//! counts running discovery tasks, the other counts submitted transfers, so
//! a momentarily empty queue is never mistaken for finished work.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fetchpool_core::download::HttpClient;
//! use fetchpool_core::pool::{DownloadRequest, PoolOptions, TracingReporter, WorkerPool};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(WorkerPool::new(HttpClient::new(), PoolOptions::new(4)?));
//!
//! let producer = Arc::clone(&pool);
//! pool.spawn_discovery(async move {
//!     for n in 1..=3 {
//!         let request = DownloadRequest::new(
//!             format!("https://example.com/album/{n}.jpg"),
//!             "./album",
//!             Arc::new(TracingReporter),
//!         );
//!         let _ = producer.submit(request).await;
//!     }
//! });
//!
//! pool.wait().await;
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

mod reporter;
mod request;
mod template;
mod tracker;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::HttpClient;

pub use reporter::{NoopReporter, Reporter, SkipReason, TracingReporter};
pub use request::DownloadRequest;
pub use template::{FilenameTemplate, TemplateError};
pub use tracker::{CompletionGuard, CompletionTracker};

use worker::{WorkerContext, run_worker};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default number of workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Queue slots per worker when no explicit capacity is given.
pub const QUEUE_DEPTH_PER_WORKER: usize = 10;

/// Error type for worker pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool no longer accepts submissions.
    #[error("worker pool is closed")]
    Closed,

    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Validated settings for a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    concurrency: usize,
    queue_capacity: usize,
    min_size: u64,
    filename_template: Option<FilenameTemplate>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_CONCURRENCY * QUEUE_DEPTH_PER_WORKER,
            min_size: 0,
            filename_template: None,
        }
    }
}

impl PoolOptions {
    /// Creates options for `concurrency` workers with the default queue depth.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    pub fn new(concurrency: usize) -> Result<Self, PoolError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(PoolError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            concurrency,
            queue_capacity: concurrency * QUEUE_DEPTH_PER_WORKER,
            min_size: 0,
            filename_template: None,
        })
    }

    /// Overrides the queue capacity. Zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Skips files known to be smaller than `min_size` bytes. Zero disables.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Names every destination with `template`, relative to the request folder.
    #[must_use]
    pub fn with_filename_template(mut self, template: FilenameTemplate) -> Self {
        self.filename_template = Some(template);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    #[must_use]
    pub fn filename_template(&self) -> Option<&FilenameTemplate> {
        self.filename_template.as_ref()
    }
}

/// Fixed-size pool of transfer workers fed by a bounded queue.
///
/// # Concurrency Model
///
/// - Each worker is a Tokio task; all share one [`HttpClient`]
/// - Workers take turns receiving from one bounded channel
/// - A worker exits once every sender is gone and the queue is drained
///
/// # Shutdown
///
/// - [`close`](Self::close) stops submissions and drains queued work
/// - [`close_now`](Self::close_now) also cancels running transfers; queued
///   requests are reported as skipped
///
/// Both are idempotent.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<DownloadRequest>>>,
    closed: AtomicBool,
    discovery: CompletionTracker,
    transfers: CompletionTracker,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    concurrency: usize,
}

impl WorkerPool {
    /// Starts `options.concurrency()` workers. Must be called inside a Tokio runtime.
    #[instrument(level = "debug", skip(client))]
    pub fn new(client: HttpClient, options: PoolOptions) -> Self {
        let (sender, receiver) = mpsc::channel(options.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let cancel = CancellationToken::new();
        let transfers = CompletionTracker::new();
        let context = Arc::new(WorkerContext {
            client,
            min_size: options.min_size,
            template: options.filename_template.clone(),
            cancel: cancel.clone(),
        });

        let workers = (0..options.concurrency)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&context),
                    transfers.clone(),
                ))
            })
            .collect();

        debug!(
            concurrency = options.concurrency,
            queue_capacity = options.queue_capacity,
            min_size = options.min_size,
            "worker pool started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            discovery: CompletionTracker::new(),
            transfers,
            workers: Mutex::new(workers),
            cancel,
            concurrency: options.concurrency,
        }
    }

    /// Returns the number of workers.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns true once [`close`](Self::close) or [`close_now`](Self::close_now) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of submitted transfers not yet finished.
    #[must_use]
    pub fn pending_transfers(&self) -> usize {
        self.transfers.pending()
    }

    /// Queues a request, waiting for space when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] if the pool is closed. The request's
    /// reporter receives [`SkipReason::PoolClosed`] first, so the request is
    /// never silently dropped.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn submit(&self, request: DownloadRequest) -> Result<(), PoolError> {
        let sender = if self.is_closed() {
            None
        } else {
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        };
        let Some(sender) = sender else {
            return Err(reject(&request));
        };

        // Count only once a slot is reserved, so a dropped submit leaks nothing.
        let Ok(permit) = sender.reserve().await else {
            return Err(reject(&request));
        };
        self.transfers.add();
        permit.send(request);
        Ok(())
    }

    /// Registers a discovery task; work is "still being produced" until the guard drops.
    #[must_use]
    pub fn begin_discovery(&self) -> CompletionGuard {
        self.discovery.guard()
    }

    /// Spawns `task` as a tracked discovery task.
    pub fn spawn_discovery<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.begin_discovery();
        tokio::spawn(async move {
            let _guard = guard;
            task.await
        })
    }

    /// Waits until every discovery task has finished and every submitted
    /// transfer has completed.
    pub async fn wait(&self) {
        self.discovery.wait().await;
        self.transfers.wait().await;
    }

    /// Stops accepting work, lets workers drain the queue, and waits for them.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !workers.is_empty() {
            debug!(workers = workers.len(), "waiting for workers to drain");
        }
        for handle in workers {
            // A panicked worker already released its slot.
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task panicked");
            }
        }
        self.transfers.wait().await;
        info!("worker pool closed");
    }

    /// Like [`close`](Self::close), but cancels running transfers first.
    pub async fn close_now(&self) {
        self.cancel.cancel();
        self.close().await;
    }
}

fn reject(request: &DownloadRequest) -> PoolError {
    debug!(url = %request.url, "rejecting submission to closed pool");
    request.reporter.skip(request, &SkipReason::PoolClosed);
    PoolError::Closed
}
