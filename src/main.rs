//! CLI entry point for the fetchpool tool.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fetchpool_core::download::{ClientOptions, HttpClient, RetryPolicy};
use fetchpool_core::pool::{DownloadRequest, PoolOptions, Reporter, WorkerPool};
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::{Args, parse_url_list};
use progress::CliReporter;

/// Minimum time between bar redraws for one transfer.
const BAR_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    // Read input: from positional args or stdin
    let urls = if !args.urls.is_empty() {
        args.urls.clone()
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        parse_url_list(&buffer)
    } else {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/cat.jpg' | fetchpool -o ./pics");
        return Ok(ExitCode::SUCCESS);
    };

    if urls.is_empty() {
        info!("No URLs found in input");
        return Ok(ExitCode::SUCCESS);
    }

    let show_bars = !args.no_progress && !args.quiet && io::stderr().is_terminal();
    let client = HttpClient::with_options(ClientOptions {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        read_timeout: Duration::from_secs(args.read_timeout_secs),
        retry_policy: RetryPolicy::new(
            u32::from(args.max_retries),
            Duration::from_secs(args.retry_delay_secs),
        ),
        progress_interval: if show_bars {
            BAR_REFRESH_INTERVAL
        } else {
            Duration::ZERO
        },
        http2_prior_knowledge: args.http2_prior_knowledge,
        ..ClientOptions::default()
    })?;
    let mut options =
        PoolOptions::new(usize::from(args.concurrency))?.with_min_size(args.min_size);
    if let Some(template) = args.template.clone() {
        options = options.with_filename_template(template);
    }
    let max_retries = client.retry_policy().max_retries();
    let pool = Arc::new(WorkerPool::new(client, options));
    let reporter = Arc::new(CliReporter::new(show_bars));

    info!(
        urls = urls.len(),
        out = %args.out.display(),
        concurrency = pool.concurrency(),
        max_retries,
        "Fetchpool starting"
    );

    let producer = Arc::clone(&pool);
    let out = args.out.clone();
    let request_reporter: Arc<dyn Reporter> = reporter.clone();
    pool.spawn_discovery(async move {
        for url in urls {
            let request = DownloadRequest::new(url, &out, Arc::clone(&request_reporter));
            if producer.submit(request).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        () = pool.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling transfers");
            pool.close_now().await;
        }
    }
    pool.close().await;
    reporter.finish();

    let summary = reporter.summary();
    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Download complete"
    );

    Ok(if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
