//! Progress tracking for a single transfer.
//!
//! A [`ProgressTracker`] owns one [`Progress`] value for the lifetime of a
//! transfer (every retry shares it) and passes that same value to the
//! caller's callback on each emit. [`ProgressWriter`] wraps any async byte
//! sink and feeds the tracker as bytes land.
//!
//! Emits come in four kinds:
//! - regular progress after writes, throttled to one per `min_interval`
//! - a seed emit from [`set_size`](ProgressTracker::set_size) at the start of each attempt
//! - a warning emit from [`warn`](ProgressTracker::warn), never repeated
//! - exactly one terminal emit from [`close`](ProgressTracker::close)

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;

use super::DownloadError;

/// Callback invoked with progress updates.
///
/// The same `Progress` value is passed on every call; clone it to keep it.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Snapshot of a transfer's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// URL being downloaded.
    pub url: String,
    /// Final destination file (bytes land in its `.part` sibling first).
    pub file: PathBuf,
    /// Total size in bytes, `None` when unknown.
    pub total: Option<u64>,
    /// Bytes in the partial file, including bytes kept from earlier attempts.
    pub written: u64,
    /// Bytes received across all attempts, restarted ones included.
    ///
    /// Unlike `written`, never drops when an attempt starts over.
    pub transferred: u64,
    /// 0-100, `None` when `total` is unknown.
    pub percent_complete: Option<f64>,
    /// Set once, by the terminal emit.
    pub done: bool,
    /// Terminal error message. Only ever set together with `done`.
    pub error: Option<String>,
    /// Non-fatal warning, present only for the emit that reports it.
    pub warning: Option<String>,
}

impl Progress {
    fn new(url: &str, file: &Path, total: Option<u64>) -> Self {
        Self {
            url: url.to_string(),
            file: file.to_path_buf(),
            total,
            written: 0,
            transferred: 0,
            percent_complete: total.map(|_| 0.0),
            done: false,
            error: None,
            warning: None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn recompute_percent(&mut self) {
        self.percent_complete = self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                self.written as f64 / total as f64 * 100.0
            }
        });
    }
}

/// Byte-counting observer that reports to a [`ProgressCallback`].
pub struct ProgressTracker {
    progress: Progress,
    callback: ProgressCallback,
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("progress", &self.progress)
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    /// Creates a tracker for `url` → `file`.
    ///
    /// `min_interval` throttles regular write emits; `Duration::ZERO` emits on every write.
    #[must_use]
    pub fn new(
        url: &str,
        file: &Path,
        total: Option<u64>,
        callback: ProgressCallback,
        min_interval: Duration,
    ) -> Self {
        Self {
            progress: Progress::new(url, file, total),
            callback,
            min_interval,
            last_emit: None,
        }
    }

    /// Current progress state.
    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Sets the expected total size without emitting.
    pub fn set_total(&mut self, total: Option<u64>) {
        self.progress.total = total;
        self.progress.recompute_percent();
    }

    /// Seeds `written` with bytes already on disk and emits immediately.
    pub fn set_size(&mut self, size: u64) {
        self.progress.written = size;
        self.progress.recompute_percent();
        self.emit();
    }

    /// Counts `n` freshly written bytes, emitting unless throttled.
    pub fn record(&mut self, n: u64) {
        self.progress.written = self.progress.written.saturating_add(n);
        self.progress.transferred = self.progress.transferred.saturating_add(n);
        self.progress.recompute_percent();
        let throttled = self
            .last_emit
            .is_some_and(|last| last.elapsed() < self.min_interval);
        if !throttled {
            self.emit();
        }
    }

    /// Emits a one-off warning, then clears it.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.progress.warning = Some(message.into());
        self.emit();
        self.progress.warning = None;
    }

    /// Emits the terminal event. Consumes the tracker, so it happens once.
    pub fn close(mut self, error: Option<&DownloadError>) -> Progress {
        self.progress.error = error.map(ToString::to_string);
        self.progress.done = true;
        self.emit();
        self.progress
    }

    fn emit(&mut self) {
        self.last_emit = Some(Instant::now());
        (self.callback)(&self.progress);
    }
}

/// Async sink decorator that reports every accepted byte to a tracker.
pub struct ProgressWriter<'a, W> {
    inner: W,
    tracker: &'a mut ProgressTracker,
    written: u64,
}

impl<'a, W> ProgressWriter<'a, W> {
    /// Wraps `inner`, reporting to `tracker`.
    pub fn new(inner: W, tracker: &'a mut ProgressTracker) -> Self {
        Self {
            inner,
            tracker,
            written: 0,
        }
    }

    /// Bytes accepted through this writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Unwraps the inner sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<'_, W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                let n64 = n as u64;
                this.written += n64;
                this.tracker.record(n64);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
