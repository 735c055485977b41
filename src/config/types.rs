use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{ConfigError, Result};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/shortcut-signing-server/config.toml";

/// System configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub tls_cert_file: Option<String>,
    #[serde(default)]
    pub tls_key_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Root for per-request workspaces; must already exist
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    #[serde(default = "default_max_content_size")]
    pub max_content_size: String,
    /// `<= 0` disables the limit
    #[serde(default)]
    pub max_concurrent_jobs: i64,
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,
    #[serde(default)]
    pub full_error_responses: bool,
    /// Directory containing a custom `form.html`
    #[serde(default)]
    pub templates_dir: Option<String>,
    #[serde(default = "default_signer_program")]
    pub signer_program: String,
    /// Seconds; 0 waits for the signer indefinitely
    #[serde(default)]
    pub signer_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

/// Validated settings consumed by the signing service and the HTTP layer.
///
/// The server builds them with [`SystemConfig::validate`] and never changes
/// them afterwards; tests start from `for_temp_dir` and adjust fields.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub temp_dir: PathBuf,
    pub max_content_size: usize,
    pub max_concurrent_jobs: i64,
    pub max_filename_length: usize,
    pub full_error_responses: bool,
    pub templates_dir: Option<PathBuf>,
    pub signer_program: String,
    pub signer_timeout: Option<Duration>,
    pub metrics_enabled: bool,
    pub metrics_path: String,
    pub health_path: String,
}

impl ServerSettings {
    /// Default settings rooted at `temp_dir`, bypassing validation
    #[cfg(test)]
    pub fn for_temp_dir(temp_dir: &Path) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            temp_dir: temp_dir.to_path_buf(),
            max_content_size: 10 * 1024 * 1024,
            max_concurrent_jobs: 0,
            max_filename_length: default_max_filename_length(),
            full_error_responses: false,
            templates_dir: None,
            signer_program: default_signer_program(),
            signer_timeout: None,
            metrics_enabled: true,
            metrics_path: default_metrics_path(),
            health_path: default_health_path(),
        }
    }
}

impl SystemConfig {
    /// Load system configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound { path: path_str })?;

        let config: SystemConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            tls_enabled: false,
            tls_cert_file: None,
            tls_key_file: None,
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            max_content_size: default_max_content_size(),
            max_concurrent_jobs: 0,
            max_filename_length: default_max_filename_length(),
            full_error_responses: false,
            templates_dir: None,
            signer_program: default_signer_program(),
            signer_timeout: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            quiet: false,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            metrics_path: default_metrics_path(),
            health_path: default_health_path(),
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_temp_dir() -> String {
    std::env::temp_dir().to_string_lossy().to_string()
}

fn default_max_content_size() -> String {
    "10MB".to_string()
}

fn default_max_filename_length() -> usize {
    255
}

fn default_signer_program() -> String {
    "shortcuts".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}
