use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Application error: {0}")]
    Application(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Failures of a single signing request.
///
/// Every variant terminates the request with exactly one response; the status
/// code and the short public phrase are fixed per variant.
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Too many concurrent jobs (limit {limit})")]
    AdmissionRejected { limit: usize },

    #[error("Unsupported Content-Type '{media_type}'")]
    UnsupportedMediaType { media_type: String },

    #[error("Request body exceeds the limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Failed to decode {media_type} payload: {message}")]
    Decode { media_type: String, message: String },

    #[error("Missing shortcut")]
    MissingShortcut,

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl SigningError {
    pub fn decode(media_type: &str, err: impl std::fmt::Display) -> Self {
        SigningError::Decode {
            media_type: media_type.to_string(),
            message: err.to_string(),
        }
    }

    /// HTTP status used when this failure terminates a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            SigningError::AdmissionRejected { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SigningError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            SigningError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SigningError::Decode { .. } => StatusCode::BAD_REQUEST,
            SigningError::MissingShortcut => StatusCode::BAD_REQUEST,
            SigningError::Workspace(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SigningError::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Canonical phrase returned when full error responses are disabled
    pub fn public_message(&self) -> &'static str {
        match self {
            SigningError::AdmissionRejected { .. } => "Too many concurrent jobs",
            SigningError::UnsupportedMediaType { .. } => "Unsupported Content-Type",
            SigningError::BodyTooLarge { .. } => "Content too large",
            SigningError::Decode { .. } => "Error parsing content",
            SigningError::MissingShortcut => "Missing shortcut",
            SigningError::Workspace(_) | SigningError::Signer(_) => "Internal server error",
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SigningError::AdmissionRejected { .. } => "admission_rejected",
            SigningError::UnsupportedMediaType { .. } => "unsupported_media_type",
            SigningError::BodyTooLarge { .. } => "body_too_large",
            SigningError::Decode { .. } => "decode_error",
            SigningError::MissingShortcut => "validation_error",
            SigningError::Workspace(_) => "workspace_failure",
            SigningError::Signer(_) => "signing_failure",
        }
    }
}

/// Workspace allocation errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    #[error("System clock is before the unix epoch")]
    Clock,

    #[error("Failed to create workspace directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while handing a shortcut to the external signer
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Failed to write unsigned shortcut {path}: {source}")]
    WriteInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Signer '{program}' could not be started: {source}")]
    StartFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", exit_message(.code, .stderr))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Signer '{program}' timed out after {timeout}s")]
    Timeout { program: String, timeout: u64 },

    #[error("Failed to read signed shortcut {path}: {source}")]
    ReadOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_message(code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match code {
        Some(code) => format!("signer exited with status {}", code),
        None => "signer was terminated by a signal".to_string(),
    }
}

/// Type alias for Results
pub type Result<T> = std::result::Result<T, Error>;
