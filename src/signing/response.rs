//! Response composition for signing outcomes

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::types::SigningError;

/// Extension appended to every proposed download filename
pub const SHORTCUT_EXTENSION: &str = ".shortcut";

/// Header carrying the workspace identifier of a successful job
pub const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-signing-job-id");

/// Builds the HTTP response for a finished signing request
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    /// Show the underlying error text instead of the canonical phrase
    verbose: bool,
    /// Upper bound in bytes for `<name>.shortcut`
    max_filename_length: usize,
}

impl ResponseComposer {
    pub fn new(verbose: bool, max_filename_length: usize) -> Self {
        Self {
            verbose,
            max_filename_length,
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// 200 with the signed artifact as an attachment
    pub fn success(&self, name: Option<&str>, job_id: &str, signed: Vec<u8>) -> Response {
        let filename = self.download_filename(name, job_id);
        let disposition = HeaderValue::from_bytes(
            format!("attachment; filename=\"{}\"", filename).as_bytes(),
        )
        .unwrap_or_else(|_| {
            HeaderValue::from_static("attachment; filename=\"signed.shortcut\"")
        });

        let mut response = Response::new(Body::from(signed));
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(header::CONTENT_DISPOSITION, disposition);
        if let Ok(value) = HeaderValue::from_str(job_id) {
            headers.insert(JOB_ID_HEADER, value);
        }
        response
    }

    /// Fixed status per failure kind; plain-text body per the verbosity setting
    pub fn failure(&self, err: &SigningError) -> Response {
        let body = if self.verbose {
            err.to_string()
        } else {
            err.public_message().to_string()
        };
        (err.status_code(), body).into_response()
    }

    /// Plain 500 for failures outside the signing pipeline, e.g. a crashed task
    pub fn internal_error(&self, detail: &str) -> Response {
        let body = if self.verbose {
            detail.to_string()
        } else {
            "Internal server error".to_string()
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }

    /// `<sanitized name>.shortcut`, falling back to the job id for blank names
    pub fn download_filename(&self, name: Option<&str>, job_id: &str) -> String {
        let budget = self
            .max_filename_length
            .saturating_sub(SHORTCUT_EXTENSION.len());

        let stem = name
            .map(sanitize_filename)
            .map(|stem| truncate_to_boundary(&stem, budget).trim_end().to_string())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| truncate_to_boundary(job_id, budget).to_string());

        if stem.is_empty() {
            warn!(job_id = %job_id, "Filename budget too small, using job id verbatim");
            return format!("{}{}", job_id, SHORTCUT_EXTENSION);
        }

        format!("{}{}", stem, SHORTCUT_EXTENSION)
    }
}

/// Trim and replace characters that would break the Content-Disposition value
/// or act as a path separator on the client side.
pub fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn truncate_to_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
