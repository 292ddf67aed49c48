//! Terminal reporting for pooled downloads.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use fetchpool_core::download::{DownloadError, Progress, TransferResult};
use fetchpool_core::pool::{DownloadRequest, Reporter, SkipReason, TracingReporter};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Final counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) completed: usize,
    pub(crate) failed: usize,
    pub(crate) skipped: usize,
}

/// Reporter that draws one bar per active transfer, or logs when bars are off.
pub(crate) struct CliReporter {
    multi: Option<MultiProgress>,
    bars: Mutex<HashMap<String, ProgressBar>>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl CliReporter {
    pub(crate) fn new(show_bars: bool) -> Self {
        Self {
            multi: show_bars.then(|| MultiProgress::with_draw_target(ProgressDrawTarget::stderr())),
            bars: Mutex::new(HashMap::new()),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    pub(crate) fn summary(&self) -> RunSummary {
        RunSummary {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }

    /// Clears any bars left by interrupted transfers.
    pub(crate) fn finish(&self) {
        for (_, bar) in self.lock_bars().drain() {
            bar.finish_and_clear();
        }
    }

    fn lock_bars(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn println(&self, line: String) {
        if let Some(multi) = &self.multi {
            let _ = multi.println(line);
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:.bold} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-")
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Reporter for CliReporter {
    fn start(&self, request: &DownloadRequest, destination: &Path) {
        let Some(multi) = &self.multi else {
            TracingReporter.start(request, destination);
            return;
        };
        let bar = multi.add(ProgressBar::new(0));
        bar.set_style(bar_style());
        bar.set_prefix(display_name(destination));
        self.lock_bars().insert(request.url.clone(), bar);
    }

    fn progress(&self, request: &DownloadRequest, progress: &Progress) {
        if self.multi.is_none() {
            TracingReporter.progress(request, progress);
            return;
        }
        if let Some(warning) = &progress.warning {
            self.println(format!("warning: {}: {warning}", display_name(&progress.file)));
        }
        if let Some(bar) = self.lock_bars().get(&request.url) {
            if let Some(total) = progress.total {
                bar.set_length(total);
            }
            bar.set_position(progress.written);
        }
    }

    fn skip(&self, request: &DownloadRequest, reason: &SkipReason) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        if self.multi.is_some() {
            self.println(format!("skipped {}: {reason}", request.url));
        } else {
            TracingReporter.skip(request, reason);
        }
    }

    fn end(&self, request: &DownloadRequest, result: &Result<TransferResult, DownloadError>) {
        match result {
            Ok(_) => self.completed.fetch_add(1, Ordering::SeqCst),
            Err(_) => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        if self.multi.is_none() {
            TracingReporter.end(request, result);
            return;
        }
        if let Some(bar) = self.lock_bars().remove(&request.url) {
            bar.finish_and_clear();
        }
        if let Err(error) = result {
            self.println(format!("failed {}: {error}", request.url));
        }
    }
}
