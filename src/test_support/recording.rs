use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::download::{DownloadError, Progress, TransferResult};
use crate::pool::{DownloadRequest, Reporter, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(PathBuf),
    Progress { written: u64, done: bool },
    Skip(SkipReason),
    End { ok: bool },
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
                Event::Skip(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Reporter for RecordingReporter {
    fn start(&self, _request: &DownloadRequest, destination: &Path) {
        self.lock().push(Event::Start(destination.to_path_buf()));
    }

    fn progress(&self, _request: &DownloadRequest, progress: &Progress) {
        self.lock().push(Event::Progress {
            written: progress.written,
            done: progress.done,
        });
    }

    fn skip(&self, _request: &DownloadRequest, reason: &SkipReason) {
        self.lock().push(Event::Skip(reason.clone()));
    }

    fn end(&self, _request: &DownloadRequest, result: &Result<TransferResult, DownloadError>) {
        self.lock().push(Event::End { ok: result.is_ok() });
    }
}
