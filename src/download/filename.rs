//! Filename extraction, sanitization, and partial-path helpers.
//!
//! This module derives safe filenames from URLs and `Content-Disposition`
//! headers, and maps destinations to their `.part` counterparts.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::constants::PARTIAL_SUFFIX;

/// Strict `attachment; ... filename="..."` pattern. Anything else yields no name.
static CONTENT_DISPOSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"^attachment;.*filename="([^"]*)".*$"#).expect("static regex is valid")
});

/// Returns `<destination>.part`.
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Returns true if `path` names an in-progress partial file.
#[must_use]
pub fn is_partial_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(PARTIAL_SUFFIX))
}

/// Extracts the quoted filename from an `attachment` Content-Disposition value.
///
/// Returns an empty string when the header does not match.
pub(crate) fn parse_content_disposition(header: &str) -> String {
    CONTENT_DISPOSITION_RE
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Reduces a Content-Type value to its `type/subtype` token.
///
/// Parameters such as `; charset=utf-8` are discarded. Values without a
/// well-formed media type yield an empty string.
pub(crate) fn parse_media_type(content_type: &str) -> String {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return String::new();
    };
    if kind.is_empty() || !kind.chars().all(is_token_char) || !subtype.chars().all(is_token_char)
    {
        return String::new();
    }
    essence.to_string()
}

/// RFC 7230 `tchar`.
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

/// Sanitizes a filename for safe filesystem storage.
///
/// Path separators and reserved characters become `_`; names made only of
/// dots (`.`/`..`) are neutralized.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.chars().all(|c| c == '.') {
        return sanitized.replace('.', "_");
    }
    sanitized
}

/// Derives a filename from the last URL path segment, percent-decoded.
///
/// Returns `None` when the URL has no usable final segment.
pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    let name = sanitize_filename(&decoded);
    (!name.is_empty()).then_some(name)
}
