//! Logging setup for the signing server
//!
//! Structured logging with `tracing`:
//! - JSON, pretty and compact output
//! - Level from the configuration, overridable through `RUST_LOG`
//! - Output to stdout, an append-only log file, both, or neither
//! - Span helpers giving every request and signing job its own context
//!
//! Components never hold a logger of their own. Without an installed
//! subscriber every event is a no-op, and tests can scope one with
//! `tracing::subscriber::with_default`.

use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::{info_span, Span};
use tracing_subscriber::{
    fmt::{
        time::ChronoLocal,
        writer::{BoxMakeWriter, MakeWriterExt},
    },
    EnvFilter,
};

use crate::config::LoggingConfig;
use crate::types::{Error, Result};

/// Span wrapping one HTTP request
pub fn request_span(method: &str, uri: &str, user_agent: &str) -> Span {
    info_span!(
        "http_request",
        method = method,
        uri = uri,
        user_agent = user_agent
    )
}

/// Span wrapping one signing job; the job id is recorded once allocated
pub fn signing_span(content_type: &str) -> Span {
    info_span!(
        "signing_job",
        job_id = tracing::field::Empty,
        content_type = content_type
    )
}

/// Add the job id to the current signing span
pub fn add_job_context(job_id: &str) {
    tracing::Span::current().record("job_id", job_id);
}

/// Log level enum values as strings for configuration
pub mod level {
    pub const TRACE: &str = "trace";
    pub const DEBUG: &str = "debug";
    pub const INFO: &str = "info";
    pub const WARN: &str = "warn";
    pub const ERROR: &str = "error";
}

/// Log format enum values as strings for configuration
pub mod format {
    pub const JSON: &str = "json";
    pub const PRETTY: &str = "pretty";
    pub const COMPACT: &str = "compact";
}

/// Where log lines go, and whether they may carry ANSI colours
fn make_writer(config: &LoggingConfig) -> Result<(BoxMakeWriter, bool)> {
    let file = match config.file.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        _ => None,
    };

    let ansi = file.is_none() && !config.quiet;
    let writer = match (file, config.quiet) {
        (Some(file), false) => BoxMakeWriter::new(std::io::stdout.and(file)),
        (Some(file), true) => BoxMakeWriter::new(file),
        (None, false) => BoxMakeWriter::new(std::io::stdout),
        (None, true) => BoxMakeWriter::new(std::io::sink),
    };

    Ok((writer, ansi))
}

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over `config.level`; CLI overrides must already
/// be applied to `config`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Create a custom time formatter for better readability
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let (writer, ansi) = make_writer(config)?;

    let result = match config.format.as_str() {
        format::JSON => tracing_subscriber::fmt()
            .json()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_target(false)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        format::PRETTY => tracing_subscriber::fmt()
            .pretty()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .compact()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .try_init(),
    };

    result.map_err(|e| Error::Application(format!("Failed to initialize logging: {}", e)))
}
