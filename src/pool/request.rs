//! Transfer requests submitted to a [`WorkerPool`](super::WorkerPool).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use super::reporter::Reporter;
use crate::download::RemoteFileInfo;

/// One file to fetch, as produced by a discovery task.
///
/// Owned by whichever worker dequeues it and never changed after submission.
#[derive(Clone)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,
    /// Directory the file is saved into (created on demand).
    pub to_folder: PathBuf,
    /// Suggested filename. When absent, the probed `Content-Disposition`
    /// name or the URL's last path segment is used.
    pub filename: Option<String>,
    /// Album or gallery the file belongs to, for filename templates.
    pub album: Option<String>,
    /// Size known from discovery, if any.
    pub size: Option<u64>,
    /// Timestamp applied to the finished file's modification time.
    pub timestamp: Option<SystemTime>,
    /// Metadata from an earlier probe, reused instead of probing again.
    pub remote_info: Option<RemoteFileInfo>,
    /// Receives lifecycle events for this request.
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("to_folder", &self.to_folder)
            .field("filename", &self.filename)
            .field("album", &self.album)
            .field("size", &self.size)
            .field("timestamp", &self.timestamp)
            .field("remote_info", &self.remote_info)
            .finish_non_exhaustive()
    }
}

impl DownloadRequest {
    /// Creates a request with no filename, size, timestamp or cached metadata.
    pub fn new(
        url: impl Into<String>,
        to_folder: impl Into<PathBuf>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            url: url.into(),
            to_folder: to_folder.into(),
            filename: None,
            album: None,
            size: None,
            timestamp: None,
            remote_info: None,
            reporter,
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_remote_info(mut self, info: RemoteFileInfo) -> Self {
        self.remote_info = Some(info);
        self
    }
}
