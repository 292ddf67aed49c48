//! Metadata-only probing of remote files.
//!
//! A probe issues a `HEAD` request to learn a file's size, suggested name,
//! media type, resumability and modification time before transferring it.
//! Many servers reject `HEAD`, so callers treat probe failure as "unknown
//! metadata" rather than as a fatal error.

use std::time::SystemTime;

use reqwest::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LAST_MODIFIED,
};
use tracing::{debug, instrument};
use url::Url;

use super::filename::{parse_content_disposition, parse_media_type};
use super::{DownloadError, HttpClient};

/// Information about a file on a remote server, learned from a probe.
///
/// Never mutated after construction. Callers may cache one and hand it to
/// [`HttpClient::transfer`] to skip re-probing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFileInfo {
    /// Final URL after redirects (empty when unknown).
    pub url: String,
    /// Size in bytes, `None` when unknown.
    pub size: Option<u64>,
    /// Filename from `Content-Disposition` (empty when absent).
    pub filename: String,
    /// Media type without parameters, e.g. `image/png` (empty when absent).
    pub mime_type: String,
    /// Whether the server accepts byte-range requests.
    pub can_resume: bool,
    /// `Last-Modified` time, if present and parseable.
    pub last_modified: Option<SystemTime>,
}

impl RemoteFileInfo {
    /// Builds file info from response headers.
    ///
    /// Resume is only advertised when the size is known, since a range
    /// request needs a definite end.
    #[must_use]
    pub fn from_headers(url: impl Into<String>, headers: &HeaderMap) -> Self {
        let size = content_length(headers);
        Self {
            url: url.into(),
            size,
            filename: header_str(headers, CONTENT_DISPOSITION)
                .map(parse_content_disposition)
                .unwrap_or_default(),
            mime_type: header_str(headers, CONTENT_TYPE)
                .map(parse_media_type)
                .unwrap_or_default(),
            can_resume: size.is_some() && accepts_byte_ranges(headers),
            last_modified: last_modified(headers),
        }
    }
}

impl HttpClient {
    /// Fetches [`RemoteFileInfo`] for `url` with a `HEAD` request.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on an invalid URL, a transport failure, or any
    /// status other than 200. Callers should fall back to
    /// `RemoteFileInfo::default()`; see [`probe_or_unknown`](Self::probe_or_unknown).
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &str) -> Result<RemoteFileInfo, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.inner().head(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(DownloadError::http_status(url, status));
        }

        let info = RemoteFileInfo::from_headers(response.url().as_str(), response.headers());
        debug!(
            size = ?info.size,
            can_resume = info.can_resume,
            mime_type = %info.mime_type,
            "probe complete"
        );
        Ok(info)
    }

    /// Probes `url`, downgrading any failure to unknown metadata.
    pub async fn probe_or_unknown(&self, url: &str) -> RemoteFileInfo {
        match self.probe(url).await {
            Ok(info) => info,
            Err(error) => {
                debug!(url = %url, error = %error, "probe failed, continuing with unknown metadata");
                RemoteFileInfo::default()
            }
        }
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parses `Content-Length`; absent, negative, or malformed means unknown.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, CONTENT_LENGTH).and_then(|v| v.trim().parse::<u64>().ok())
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    header_str(headers, ACCEPT_RANGES).is_some_and(|v| v.trim() == "bytes")
}

fn last_modified(headers: &HeaderMap) -> Option<SystemTime> {
    header_str(headers, LAST_MODIFIED).and_then(|v| httpdate::parse_http_date(v).ok())
}
