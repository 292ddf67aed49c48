//! Worker loop and the per-request job it runs.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::reporter::SkipReason;
use super::request::DownloadRequest;
use super::template::FilenameTemplate;
use super::tracker::CompletionTracker;
use crate::download::{
    HttpClient, Progress, ProgressCallback, RemoteFileInfo, filename_from_url, is_partial_path,
    sanitize_filename, set_file_mtime,
};

/// Shared state every worker reads.
#[derive(Debug)]
pub(crate) struct WorkerContext {
    pub(crate) client: HttpClient,
    pub(crate) min_size: u64,
    pub(crate) template: Option<FilenameTemplate>,
    pub(crate) cancel: CancellationToken,
}

/// Drains `receiver` until every sender is gone and the queue is empty.
pub(crate) async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DownloadRequest>>>,
    context: Arc<WorkerContext>,
    transfers: CompletionTracker,
) {
    debug!(worker = id, "worker started");
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(request) = next else {
            break;
        };
        // Counted by `submit`; released here even if the job panics.
        let _slot = transfers.adopt();
        process_request(&context, request).await;
    }
    debug!(worker = id, "worker exiting");
}

/// Runs one request: resolve and render the destination, apply filters, transfer.
#[instrument(skip(context, request), fields(url = %request.url))]
pub(crate) async fn process_request(context: &WorkerContext, request: DownloadRequest) {
    let request = Arc::new(request);
    let reporter = Arc::clone(&request.reporter);

    if context.cancel.is_cancelled() {
        reporter.skip(&request, &SkipReason::Cancelled);
        return;
    }

    let mut info = request.remote_info.clone();

    let Some(filename) = resolve_filename(&context.client, &request, &mut info).await else {
        reporter.skip(&request, &SkipReason::NoFilename);
        return;
    };

    let relative = match &context.template {
        Some(template) => match template.render(&filename, &request) {
            Ok(path) => path,
            Err(error) => {
                reporter.skip(&request, &SkipReason::Template(error));
                return;
            }
        },
        None => PathBuf::from(&filename),
    };
    if is_partial_path(&relative) {
        reporter.skip(
            &request,
            &SkipReason::ReservedName {
                name: relative.display().to_string(),
            },
        );
        return;
    }

    let destination = request.to_folder.join(&relative);
    let folder = destination
        .parent()
        .map_or_else(|| request.to_folder.clone(), PathBuf::from);
    if let Err(error) = tokio::fs::create_dir_all(&folder).await {
        reporter.skip(
            &request,
            &SkipReason::Io {
                path: folder,
                message: error.to_string(),
            },
        );
        return;
    }

    match tokio::fs::try_exists(&destination).await {
        Ok(false) => {}
        Ok(true) => {
            reporter.skip(&request, &SkipReason::AlreadyExists { path: destination });
            return;
        }
        Err(error) => {
            reporter.skip(
                &request,
                &SkipReason::Io {
                    path: destination,
                    message: error.to_string(),
                },
            );
            return;
        }
    }

    if let Some(size) = below_minimum(context, &request, &mut info).await {
        reporter.skip(
            &request,
            &SkipReason::BelowMinimumSize {
                size,
                min_size: context.min_size,
            },
        );
        return;
    }

    reporter.start(&request, &destination);
    let callback: ProgressCallback = {
        let request = Arc::clone(&request);
        Arc::new(move |progress: &Progress| request.reporter.progress(&request, progress))
    };
    let result = context
        .client
        .transfer(&request.url, &destination, info, callback, &context.cancel)
        .await;

    if result.is_ok()
        && let Some(timestamp) = request.timestamp
    {
        set_file_mtime(&destination, timestamp).await;
    }
    reporter.end(&request, &result);
}

/// Request filename, then probed `Content-Disposition`, then URL basename.
async fn resolve_filename(
    client: &HttpClient,
    request: &DownloadRequest,
    info: &mut Option<RemoteFileInfo>,
) -> Option<String> {
    if let Some(name) = request
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
    {
        return Some(name);
    }

    let probed = cached_probe(client, &request.url, info).await;
    if !probed.filename.is_empty() {
        let name = sanitize_filename(&probed.filename);
        if !name.is_empty() {
            return Some(name);
        }
    }

    Url::parse(&request.url)
        .ok()
        .and_then(|url| filename_from_url(&url))
}

/// Returns the offending size when the file is known to be under `min_size`.
async fn below_minimum(
    context: &WorkerContext,
    request: &DownloadRequest,
    info: &mut Option<RemoteFileInfo>,
) -> Option<u64> {
    if context.min_size == 0 {
        return None;
    }
    if let Some(size) = request.size
        && size < context.min_size
    {
        return Some(size);
    }
    cached_probe(&context.client, &request.url, info)
        .await
        .size
        .filter(|size| *size < context.min_size)
}

/// Probes at most once per request, caching the result in `info`.
async fn cached_probe<'a>(
    client: &HttpClient,
    url: &str,
    info: &'a mut Option<RemoteFileInfo>,
) -> &'a RemoteFileInfo {
    if info.is_none() {
        *info = Some(client.probe_or_unknown(url).await);
    }
    info.get_or_insert_with(RemoteFileInfo::default)
}
