//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use fetchpool_core::DEFAULT_CONCURRENCY;
use fetchpool_core::download::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, READ_TIMEOUT_SECS};
use fetchpool_core::pool::FilenameTemplate;

/// Download files over HTTP(S) with resume, retries and bounded concurrency.
///
/// URLs come from the command line or, when none are given, from stdin
/// (one per line; blank lines and `#` comments are ignored).
#[derive(Parser, Debug)]
#[command(name = "fetchpool")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download
    pub urls: Vec<String>,

    /// Directory to save files into
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Template for saved names, relative to --out
    ///
    /// Placeholders: {filename}, {stem}, {ext}, {album}, {host}.
    /// e.g. "{host}/{stem}.{ext}"
    #[arg(short = 't', long, value_parser = FilenameTemplate::parse)]
    pub template: Option<FilenameTemplate>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Talk HTTP/2 to servers without negotiating it first
    #[arg(long)]
    pub http2_prior_knowledge: bool,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Retries after the first attempt for transient failures (0-20)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=20))]
    pub max_retries: u8,

    /// Seconds to wait between retries (max 600)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(0..=600))]
    pub retry_delay_secs: u64,

    /// Skip files known to be smaller than this many bytes (0 disables)
    #[arg(long, default_value_t = 0)]
    pub min_size: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout_secs: u64,

    /// Idle timeout between body reads in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_secs: u64,
}

/// Extracts URLs from newline-separated input, ignoring blanks and `#` comments.
pub fn parse_url_list(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}
