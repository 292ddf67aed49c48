//! HTTP client and transfer orchestrator.
//!
//! [`HttpClient::transfer`] moves one remote file to a local path. Bytes land
//! in `<destination>.part` and are renamed into place only after a complete
//! attempt, so the destination never exists in a truncated state.
//!
//! Each attempt reuses bytes already in the partial file when the server
//! accepts byte ranges, and failed attempts are retried under the client's
//! [`RetryPolicy`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RANGE;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_PROGRESS_INTERVAL, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::partial_path;
use super::probe::{RemoteFileInfo, content_length};
use super::progress::{ProgressCallback, ProgressTracker, ProgressWriter};
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::user_agent;

/// Settings for building an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum time to establish a connection.
    pub connect_timeout: Duration,
    /// Maximum idle time between reads of a response.
    pub read_timeout: Duration,
    /// Optional deadline for a whole attempt, headers and body included.
    pub request_timeout: Option<Duration>,
    /// Retry budget and delay for failed attempts.
    pub retry_policy: RetryPolicy,
    /// Minimum time between regular progress emits.
    pub progress_interval: Duration,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Speak HTTP/2 without negotiation, including over plain `http://`.
    pub http2_prior_knowledge: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            request_timeout: None,
            retry_policy: RetryPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            user_agent: user_agent::default_user_agent(),
            http2_prior_knowledge: false,
        }
    }
}

/// HTTP client for probing and transferring files.
///
/// Create once and share: clones are cheap and reuse one connection pool.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
///
/// use fetchpool_core::download::{HttpClient, Progress};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let result = client
///     .get_file(
///         "https://example.com/cat.jpg",
///         Path::new("./downloads/cat.jpg"),
///         Arc::new(|p: &Progress| println!("{} bytes", p.written)),
///     )
///     .await?;
/// println!("saved {}", result.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
    progress_interval: Duration,
    request_timeout: Option<Duration>,
}

/// Outcome of a successful [`HttpClient::transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// Final destination path.
    pub path: PathBuf,
    /// Bytes written across all attempts, resumed and restarted ones included.
    pub bytes_written: u64,
    /// Total size when known.
    pub total: Option<u64>,
    /// Number of attempts made, at least 1.
    pub attempts: u32,
    /// Whether any attempt continued from an existing partial file.
    pub resumed: bool,
}

/// What a single attempt did before it returned.
#[derive(Debug, Default)]
struct AttemptReport {
    written: u64,
    /// Growth of the partial file past its size when the attempt began.
    gained: u64,
    resumed: bool,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts and retry policy.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes between reads
    /// - Retries: 5, five seconds apart
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client from explicit options.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend or resolver cannot be
    /// initialized.
    pub fn with_options(options: ClientOptions) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .user_agent(options.user_agent);
        if options.http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            retry_policy: options.retry_policy,
            progress_interval: options.progress_interval,
            request_timeout: options.request_timeout,
        })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Returns the retry policy applied by [`transfer`](Self::transfer).
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Transfers `url` to `destination`, probing first and never cancelled.
    ///
    /// # Errors
    ///
    /// See [`transfer`](Self::transfer).
    pub async fn get_file(
        &self,
        url: &str,
        destination: &Path,
        callback: ProgressCallback,
    ) -> Result<TransferResult, DownloadError> {
        self.transfer(url, destination, None, callback, &CancellationToken::new())
            .await
    }

    /// Transfers `url` to `destination` with resume and retries.
    ///
    /// When `info` is `None` the file is probed first; a failed probe is not
    /// an error, the transfer just proceeds without size or resume support.
    /// `callback` sees every progress event and exactly one terminal event
    /// (`done == true`), whether the transfer succeeds or fails.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's `DownloadError` when the failure is
    /// permanent or the retry budget is exhausted, and
    /// `DownloadError::Cancelled` when `cancel` fires.
    #[instrument(skip(self, info, callback, cancel), fields(url = %url, destination = %destination.display()))]
    pub async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        info: Option<RemoteFileInfo>,
        callback: ProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, DownloadError> {
        let mut tracker =
            ProgressTracker::new(url, destination, None, callback, self.progress_interval);

        if Url::parse(url).is_err() {
            let error = DownloadError::invalid_url(url);
            tracker.close(Some(&error));
            return Err(error);
        }

        let info = match info {
            Some(info) => info,
            None => tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let error = DownloadError::cancelled(url);
                    tracker.close(Some(&error));
                    return Err(error);
                }
                info = self.probe_or_unknown(url) => info,
            },
        };
        tracker.set_total(info.size);

        let mut budget = self.retry_policy.budget();
        let mut attempts: u32 = 0;
        let mut resumed = false;

        loop {
            attempts += 1;
            let mut report = AttemptReport::default();
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(DownloadError::cancelled(url)),
                outcome = self.attempt(url, destination, &info, &mut tracker, &mut report) => outcome,
            };
            resumed |= report.resumed;

            let error = match outcome {
                Ok(()) => {
                    let progress = tracker.close(None);
                    info!(
                        bytes = progress.written,
                        attempts,
                        resumed,
                        "transfer complete"
                    );
                    return Ok(TransferResult {
                        path: destination.to_path_buf(),
                        bytes_written: progress.transferred,
                        total: progress.total,
                        attempts,
                        resumed,
                    });
                }
                Err(error) => error,
            };

            let failure = classify_error(&error);
            if failure.is_retryable() {
                tracker.warn(error.to_string());
            }

            match self
                .retry_policy
                .should_retry(&mut budget, failure, report.gained, info.can_resume)
            {
                RetryDecision::Retry { delay } => {
                    warn!(
                        error = %error,
                        attempt = attempts,
                        tries_left = budget.tries_left(),
                        delay_ms = delay.as_millis(),
                        "attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            let error = DownloadError::cancelled(url);
                            tracker.close(Some(&error));
                            return Err(error);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::FreeRetry => {
                    warn!(
                        error = %error,
                        attempt = attempts,
                        gained = report.gained,
                        "stream reset after progress, resuming without charge"
                    );
                }
                RetryDecision::DoNotRetry { reason } => {
                    let progress = tracker.close(Some(&error));
                    warn!(
                        error = %error,
                        attempts,
                        transferred = progress.transferred,
                        reason = %reason,
                        "transfer failed"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// Runs one attempt: open the partial file, request, stream, finalize.
    async fn attempt(
        &self,
        url: &str,
        destination: &Path,
        info: &RemoteFileInfo,
        tracker: &mut ProgressTracker,
        report: &mut AttemptReport,
    ) -> Result<(), DownloadError> {
        let part = partial_path(destination);

        let existing = match tokio::fs::metadata(&part).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(DownloadError::io(&part, e)),
        };
        let mut offset = if info.can_resume { existing } else { 0 };
        if let Some(size) = info.size
            && offset > size
        {
            debug!(existing, size, "partial file larger than remote file, restarting");
            offset = 0;
        }

        let file = open_partial(&part, offset > 0).await?;
        tracker.set_size(offset);
        let start = offset;

        if offset > 0 && info.size == Some(offset) {
            debug!(bytes = offset, "partial file already complete");
            drop(file);
            return finalize(&part, destination, info.last_modified).await;
        }

        let mut request = self.client.get(url);
        if offset > 0 {
            let range = match info.size {
                Some(size) => format!("bytes={offset}-{}", size - 1),
                None => format!("bytes={offset}-"),
            };
            debug!(range = %range, "resuming partial file");
            request = request.header(RANGE, range);
        }
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        if offset > 0 {
            if status == reqwest::StatusCode::PARTIAL_CONTENT {
                report.resumed = true;
            } else {
                debug!(status = status.as_u16(), "server ignored range, restarting from zero");
                file.set_len(0)
                    .await
                    .map_err(|e| DownloadError::io(&part, e))?;
                offset = 0;
                tracker.set_size(0);
            }
        }

        let total = content_length(response.headers()).map(|len| offset.saturating_add(len));
        tracker.set_total(total);

        let mut writer = ProgressWriter::new(BufWriter::new(file), tracker);
        let streamed = stream_body(&mut writer, response, url, &part).await;
        report.written = writer.written();
        report.gained = offset.saturating_add(report.written).saturating_sub(start);
        if let Err(error) = streamed {
            // Keep what was received so the next attempt can resume from it.
            if let Err(flush_error) = writer.flush().await {
                debug!(
                    path = %part.display(),
                    error = %flush_error,
                    "could not flush partial file after failed attempt"
                );
            }
            return Err(error);
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(&part, e))?;
        let file = writer.into_inner().into_inner();
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(&part, e))?;
        drop(file);

        finalize(&part, destination, info.last_modified).await
    }
}

/// Opens the partial file for appending, or creates/truncates it.
async fn open_partial(path: &Path, append: bool) -> Result<File, DownloadError> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options
        .open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))
}

/// Copies the response body into `writer`.
async fn stream_body<W>(
    writer: &mut ProgressWriter<'_, W>,
    response: reqwest::Response,
    url: &str,
    part: &Path,
) -> Result<(), DownloadError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::stream(url, writer.written(), e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::write(part, e))?;
    }
    Ok(())
}

/// Renames the partial file into place and applies `last_modified`.
async fn finalize(
    part: &Path,
    destination: &Path,
    last_modified: Option<SystemTime>,
) -> Result<(), DownloadError> {
    tokio::fs::rename(part, destination)
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    if let Some(time) = last_modified {
        set_file_mtime(destination, time).await;
    }
    Ok(())
}

/// Sets a file's modification time. Failures are logged and ignored.
pub(crate) async fn set_file_mtime(path: &Path, time: SystemTime) {
    let owned = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&owned)?
            .set_modified(time)
    })
    .await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            debug!(path = %path.display(), error = %error, "could not set modification time");
        }
        Err(error) => {
            debug!(path = %path.display(), error = %error, "modification time task failed");
        }
    }
}
