use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::types::{ServerSettings, SystemConfig};
use crate::http::form::FORM_TEMPLATE_FILE;
use crate::signing::response::SHORTCUT_EXTENSION;
use crate::types::{Error, Result};

// Validation helper functions

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Treat unset and blank optional strings alike
fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Validate listen address format (host:port)
pub(crate) fn validate_listen_address(addr: &str) -> Result<SocketAddr> {
    addr.parse::<SocketAddr>().map_err(|_| {
        invalid(
            "server.listen",
            format!(
                "Invalid listen address format '{}'. Expected format: 'host:port' (e.g., '127.0.0.1:8080')",
                addr
            ),
        )
    })
}

/// Validate that a path exists and is a directory
async fn validate_directory(path: &str, field: &str) -> Result<PathBuf> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| invalid(field, format!("Cannot access path '{}': {}", path, e)))?;

    if !metadata.is_dir() {
        return Err(invalid(field, format!("Path '{}' is not a directory", path)));
    }

    Ok(PathBuf::from(path))
}

/// Parse size string with units (B, KB, MB, GB) into bytes
pub(crate) fn parse_size_string(size: &str) -> Result<u64> {
    let normalized = size.trim().to_uppercase();

    const UNITS: [(&str, u64); 4] = [
        ("GB", 1024 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KB", 1024),
        ("B", 1),
    ];

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|&(unit, multiplier)| {
            normalized
                .strip_suffix(unit)
                .map(|number| (number.trim(), multiplier))
        })
        .unwrap_or((normalized.as_str(), 1));

    let value = number.parse::<u64>().map_err(|_| {
        invalid(
            "size",
            format!(
                "Invalid size format '{}'. Expected format: number + unit (B/KB/MB/GB) or plain bytes",
                size
            ),
        )
    })?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("size", format!("Size '{}' is too large", size)))
}

/// Validate the request body cap
pub(crate) fn validate_content_size(size: &str, field: &str) -> Result<usize> {
    let bytes = parse_size_string(size).map_err(|e| match e {
        Error::Validation { message, .. } => invalid(field, message),
        other => other,
    })?;

    if bytes == 0 {
        return Err(invalid(field, "Maximum content size must be greater than 0"));
    }

    usize::try_from(bytes)
        .map_err(|_| invalid(field, format!("Size '{}' does not fit in memory", size)))
}

/// The filename budget must leave room for at least one character before the extension
pub(crate) fn validate_filename_length(length: usize) -> Result<usize> {
    if length <= SHORTCUT_EXTENSION.len() {
        return Err(invalid(
            "signing.max_filename_length",
            format!(
                "Value {} must be larger than {} to fit '<name>{}'",
                length,
                SHORTCUT_EXTENSION.len(),
                SHORTCUT_EXTENSION
            ),
        ));
    }
    Ok(length)
}

/// Custom templates must provide the submission form
async fn validate_templates_dir(path: &str) -> Result<PathBuf> {
    let dir = validate_directory(path, "signing.templates_dir").await?;
    let form = dir.join(FORM_TEMPLATE_FILE);

    if !tokio::fs::try_exists(&form).await.unwrap_or(false) {
        return Err(invalid(
            "signing.templates_dir",
            format!(
                "Templates directory '{}' does not contain {}",
                path, FORM_TEMPLATE_FILE
            ),
        ));
    }

    Ok(dir)
}

/// Validate an endpoint path such as `/metrics`
fn validate_endpoint_path(path: &str, field: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 {
        return Err(invalid(
            field,
            format!("Path '{}' must start with '/' and name an endpoint", path),
        ));
    }
    if path == "/sign" {
        return Err(invalid(field, "Path '/sign' is reserved for signing"));
    }
    Ok(())
}

impl SystemConfig {
    /// Validate the configuration and produce the settings the server runs with
    pub async fn validate(&self) -> Result<ServerSettings> {
        // Server
        let listen = validate_listen_address(&self.server.listen)?;

        if self.server.tls_enabled {
            return Err(invalid(
                "server.tls_enabled",
                "TLS termination is not supported; run behind a TLS-terminating proxy",
            ));
        }
        if non_blank(&self.server.tls_cert_file).is_some()
            || non_blank(&self.server.tls_key_file).is_some()
        {
            warn!("TLS certificate or key configured while TLS is disabled; ignoring");
        }

        // Signing
        let temp_dir = validate_directory(&self.signing.temp_dir, "signing.temp_dir").await?;
        let max_content_size =
            validate_content_size(&self.signing.max_content_size, "signing.max_content_size")?;
        let max_filename_length = validate_filename_length(self.signing.max_filename_length)?;

        let templates_dir = match non_blank(&self.signing.templates_dir) {
            Some(dir) => Some(validate_templates_dir(dir).await?),
            None => None,
        };

        let signer_program = self.signing.signer_program.trim();
        if signer_program.is_empty() {
            return Err(invalid(
                "signing.signer_program",
                "Signer program cannot be empty",
            ));
        }

        let signer_timeout =
            (self.signing.signer_timeout > 0).then(|| Duration::from_secs(self.signing.signer_timeout));

        // Logging
        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ),
            ));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty" | "compact") {
            return Err(invalid(
                "logging.format",
                format!(
                    "Invalid log format '{}'. Must be one of: json, pretty, compact",
                    self.logging.format
                ),
            ));
        }

        if let Some(file) = non_blank(&self.logging.file) {
            if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
                validate_directory(&parent.to_string_lossy(), "logging.file").await?;
            }
        }

        // Monitoring
        validate_endpoint_path(&self.monitoring.health_path, "monitoring.health_path")?;
        if self.monitoring.metrics_enabled {
            validate_endpoint_path(&self.monitoring.metrics_path, "monitoring.metrics_path")?;
            if self.monitoring.metrics_path == self.monitoring.health_path {
                return Err(invalid(
                    "monitoring.metrics_path",
                    "Metrics and health endpoints must use different paths",
                ));
            }
        }

        Ok(ServerSettings {
            listen,
            temp_dir,
            max_content_size,
            max_concurrent_jobs: self.signing.max_concurrent_jobs,
            max_filename_length,
            full_error_responses: self.signing.full_error_responses,
            templates_dir,
            signer_program: signer_program.to_string(),
            signer_timeout,
            metrics_enabled: self.monitoring.metrics_enabled,
            metrics_path: self.monitoring.metrics_path.clone(),
            health_path: self.monitoring.health_path.clone(),
        })
    }
}
