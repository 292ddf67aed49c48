//! Destination name templates.
//!
//! A template such as `{album}/{stem}-{host}.{ext}` turns a resolved filename
//! and the request's fields into a path relative to the request's folder.
//! Templates are parsed once, up front, so a malformed one is rejected before
//! any request is queued. Rendering can still fail per request, for example
//! when `{album}` is used and the request has no album.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

use super::request::DownloadRequest;
use crate::download::sanitize_filename;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([^{}]*)\}").expect("static regex is valid")
});

/// Errors from parsing or rendering a [`FilenameTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template is blank.
    #[error("filename template is empty")]
    Empty,

    /// A `{...}` placeholder names no known field.
    #[error("unknown placeholder {{{name}}}")]
    UnknownPlaceholder {
        /// Text between the braces.
        name: String,
    },

    /// A `{` or `}` outside a well-formed placeholder.
    #[error("unbalanced brace in filename template {template:?}")]
    UnbalancedBrace {
        /// The offending template.
        template: String,
    },

    /// The placeholder has no value for this request.
    #[error("{{{field}}} has no value for this request")]
    MissingValue {
        /// Placeholder name.
        field: &'static str,
    },

    /// The rendered name would escape the request folder or names no file.
    #[error("rendered filename {rendered:?} is not a relative file path")]
    UnsafePath {
        /// The rendered text.
        rendered: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Filename,
    Stem,
    Ext,
    Album,
    Host,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "filename" => Some(Self::Filename),
            "stem" => Some(Self::Stem),
            "ext" => Some(Self::Ext),
            "album" => Some(Self::Album),
            "host" => Some(Self::Host),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Filename => "filename",
            Self::Stem => "stem",
            Self::Ext => "ext",
            Self::Album => "album",
            Self::Host => "host",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed destination name template.
///
/// Placeholders:
/// - `{filename}` - resolved filename
/// - `{stem}` / `{ext}` - filename without / only its extension (`ext` may be empty)
/// - `{album}` - [`DownloadRequest::album`]
/// - `{host}` - host of the request URL
///
/// Substituted values are sanitized, so only literal `/` in the template
/// creates subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parses `template`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for a blank template, an unknown placeholder,
    /// or a stray brace.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        if template.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_literal(&mut segments, &template[last..whole.start()], template)?;
            let field = Field::from_name(name.as_str().trim()).ok_or_else(|| {
                TemplateError::UnknownPlaceholder {
                    name: name.as_str().to_string(),
                }
            })?;
            segments.push(Segment::Field(field));
            last = whole.end();
        }
        push_literal(&mut segments, &template[last..], template)?;

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Returns the template text as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the destination path for `request`, relative to its folder.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingValue`] when a placeholder has no value,
    /// and [`TemplateError::UnsafePath`] when the result is absolute, climbs
    /// out with `..`, or names no file.
    pub fn render(
        &self,
        filename: &str,
        request: &DownloadRequest,
    ) -> Result<PathBuf, TemplateError> {
        let file = Path::new(filename);
        let host = Url::parse(&request.url)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string));

        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field(field) => {
                    let value = match field {
                        Field::Filename => Some(filename.to_string()),
                        Field::Stem => file
                            .file_stem()
                            .map(|stem| stem.to_string_lossy().into_owned()),
                        Field::Ext => Some(
                            file.extension()
                                .map(|ext| ext.to_string_lossy().into_owned())
                                .unwrap_or_default(),
                        ),
                        Field::Album => request.album.clone().filter(|album| !album.is_empty()),
                        Field::Host => host.clone(),
                    };
                    let value = value.ok_or(TemplateError::MissingValue {
                        field: field.name(),
                    })?;
                    rendered.push_str(&sanitize_filename(&value));
                }
            }
        }

        let path = PathBuf::from(&rendered);
        let relative = path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !relative || path.file_name().is_none() || rendered.ends_with('/') {
            return Err(TemplateError::UnsafePath { rendered });
        }
        Ok(path)
    }
}

fn push_literal(
    segments: &mut Vec<Segment>,
    text: &str,
    template: &str,
) -> Result<(), TemplateError> {
    if text.contains(['{', '}']) {
        return Err(TemplateError::UnbalancedBrace {
            template: template.to_string(),
        });
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pool::NoopReporter;

    fn request() -> DownloadRequest {
        DownloadRequest::new(
            "https://img.example.com/a/cat.jpg",
            "/tmp/out",
            Arc::new(NoopReporter),
        )
        .with_album("Summer 2024")
    }

    #[test]
    fn test_parse_rejects_bad_templates() {
        assert_eq!(FilenameTemplate::parse("  "), Err(TemplateError::Empty));
        assert_eq!(
            FilenameTemplate::parse("{album}/{title}"),
            Err(TemplateError::UnknownPlaceholder {
                name: "title".to_string(),
            })
        );
        assert!(matches!(
            FilenameTemplate::parse("{album/{filename}"),
            Err(TemplateError::UnbalancedBrace { .. })
        ));
        assert!(matches!(
            FilenameTemplate::parse("{filename}}"),
            Err(TemplateError::UnbalancedBrace { .. })
        ));
    }

    #[test]
    fn test_render_substitutes_fields() {
        let template = FilenameTemplate::parse("{album}/{host}-{stem}.{ext}").unwrap();
        assert_eq!(template.as_str(), "{album}/{host}-{stem}.{ext}");

        let path = template.render("cat.jpg", &request()).unwrap();
        assert_eq!(path, PathBuf::from("Summer 2024/img.example.com-cat.jpg"));
    }

    #[test]
    fn test_render_sanitizes_substituted_values() {
        let template = FilenameTemplate::parse("{album}/{filename}").unwrap();
        let request = request().with_album("../../etc");

        let path = template.render("cat.jpg", &request).unwrap();
        assert_eq!(path, PathBuf::from(".._.._etc/cat.jpg"));
    }

    #[test]
    fn test_render_missing_album_is_error() {
        let template = FilenameTemplate::parse("{album}/{filename}").unwrap();
        let mut request = request();
        request.album = None;

        assert_eq!(
            template.render("cat.jpg", &request),
            Err(TemplateError::MissingValue { field: "album" })
        );
    }

    #[test]
    fn test_render_rejects_escaping_paths() {
        for text in ["../{filename}", "/abs/{filename}", "{stem}/"] {
            let template = FilenameTemplate::parse(text).unwrap();
            assert!(
                matches!(
                    template.render("cat.jpg", &request()),
                    Err(TemplateError::UnsafePath { .. })
                ),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_render_ext_may_be_empty() {
        let template = FilenameTemplate::parse("{stem}{ext}").unwrap();
        assert_eq!(
            template.render("README", &request()).unwrap(),
            PathBuf::from("README")
        );
    }
}
