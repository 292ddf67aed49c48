#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fetchpool_core::download::{DownloadError, Progress, TransferResult};
use fetchpool_core::pool::{DownloadRequest, Reporter, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start { url: String, destination: PathBuf },
    Progress { url: String, written: u64, done: bool },
    Skip { url: String, reason: SkipReason },
    End { url: String, ok: bool },
}

/// Reporter that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn skips(&self) -> Vec<SkipReason> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                Event::Skip { reason, .. } => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `end` calls that carried `Ok`.
    pub fn completed(&self) -> usize {
        self.lock()
            .iter()
            .filter(|event| matches!(event, Event::End { ok: true, .. }))
            .count()
    }

    /// Number of `end` calls that carried `Err`.
    pub fn failed(&self) -> usize {
        self.lock()
            .iter()
            .filter(|event| matches!(event, Event::End { ok: false, .. }))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reporter for RecordingReporter {
    fn start(&self, request: &DownloadRequest, destination: &Path) {
        self.lock().push(Event::Start {
            url: request.url.clone(),
            destination: destination.to_path_buf(),
        });
    }

    fn progress(&self, request: &DownloadRequest, progress: &Progress) {
        self.lock().push(Event::Progress {
            url: request.url.clone(),
            written: progress.written,
            done: progress.done,
        });
    }

    fn skip(&self, request: &DownloadRequest, reason: &SkipReason) {
        self.lock().push(Event::Skip {
            url: request.url.clone(),
            reason: reason.clone(),
        });
    }

    fn end(&self, request: &DownloadRequest, result: &Result<TransferResult, DownloadError>) {
        self.lock().push(Event::End {
            url: request.url.clone(),
            ok: result.is_ok(),
        });
    }
}
