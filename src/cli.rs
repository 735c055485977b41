use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, instrument};

use crate::config::{LoggingConfig, SystemConfig, DEFAULT_CONFIG_PATH};
use crate::http::form::FormRenderer;
use crate::types::Result;

#[derive(Parser, Debug)]
#[command(name = "shortcut-signing-server")]
#[command(about = "A simple server for signing iOS/macOS shortcuts over HTTP")]
#[command(long_about = "
Accepts unsigned shortcuts over HTTP as JSON, YAML, form data or raw plist,
signs them with the platform `shortcuts` tool and returns the signed file.
")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path; a missing file means built-in defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Override log level
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Override log format
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Set log level to debug
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable logging to stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the signing server (default if no subcommand given)
    Serve(ServeArgs),
    /// Validate the configuration file
    Validate,
    /// Show version and build information
    Version,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Listen address (format: "host:port")
    pub listen: Option<String>,

    /// Enable TLS
    #[arg(long)]
    pub tls: bool,

    /// Path to the TLS certificate
    #[arg(long)]
    pub tls_cert: Option<String>,

    /// Path to the TLS private key
    #[arg(long)]
    pub tls_key: Option<String>,

    /// Return the underlying error text instead of short status phrases
    #[arg(long = "real-error-responses", visible_alias = "re")]
    pub real_error_responses: bool,

    /// Maximum number of concurrent signing jobs (0 or less: unlimited)
    #[arg(long, allow_negative_numbers = true)]
    pub max_concurrent_jobs: Option<i64>,

    /// Directory containing a custom form.html
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Root directory for per-request workspaces
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Maximum request body size (e.g. "10MB")
    #[arg(long)]
    pub max_content_size: Option<String>,

    /// Signer program to invoke
    #[arg(long)]
    pub signer: Option<String>,
}

impl Cli {
    /// Level forced by the command line, if any; an explicit level wins over --debug
    pub fn log_level_override(&self) -> Option<&'static str> {
        match (&self.log_level, self.debug) {
            (Some(level), _) => Some(match level {
                LogLevel::Trace => crate::logging::level::TRACE,
                LogLevel::Debug => crate::logging::level::DEBUG,
                LogLevel::Info => crate::logging::level::INFO,
                LogLevel::Warn => crate::logging::level::WARN,
                LogLevel::Error => crate::logging::level::ERROR,
            }),
            (None, true) => Some(crate::logging::level::DEBUG),
            (None, false) => None,
        }
    }

    /// Get log format override from CLI arguments
    pub fn log_format_override(&self) -> Option<&'static str> {
        self.log_format.as_ref().map(|fmt| match fmt {
            LogFormat::Json => crate::logging::format::JSON,
            LogFormat::Pretty => crate::logging::format::PRETTY,
            LogFormat::Compact => crate::logging::format::COMPACT,
        })
    }

    /// Apply logging flags on top of the file configuration
    pub fn apply_logging_overrides(&self, logging: &mut LoggingConfig) {
        if let Some(level) = self.log_level_override() {
            logging.level = level.to_string();
        }
        if let Some(format) = self.log_format_override() {
            logging.format = format.to_string();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.to_string_lossy().to_string());
        }
        if self.quiet {
            logging.quiet = true;
        }
    }
}

impl ServeArgs {
    /// Apply serve flags on top of the file configuration
    pub fn apply(&self, config: &mut SystemConfig) {
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
        if self.tls {
            config.server.tls_enabled = true;
        }
        if let Some(cert) = &self.tls_cert {
            config.server.tls_cert_file = Some(cert.clone());
        }
        if let Some(key) = &self.tls_key {
            config.server.tls_key_file = Some(key.clone());
        }
        if self.real_error_responses {
            config.signing.full_error_responses = true;
        }
        if let Some(jobs) = self.max_concurrent_jobs {
            config.signing.max_concurrent_jobs = jobs;
        }
        if let Some(templates) = &self.templates {
            config.signing.templates_dir = Some(templates.to_string_lossy().to_string());
        }
        if let Some(temp_dir) = &self.temp_dir {
            config.signing.temp_dir = temp_dir.to_string_lossy().to_string();
        }
        if let Some(size) = &self.max_content_size {
            config.signing.max_content_size = size.clone();
        }
        if let Some(signer) = &self.signer {
            config.signing.signer_program = signer.clone();
        }
    }
}

/// Run the signing server
#[instrument(skip_all)]
pub async fn run_server(args: ServeArgs, mut config: SystemConfig) -> Result<()> {
    args.apply(&mut config);

    let settings = config.validate().await.map_err(|e| {
        error!(error = %e, "Configuration validation failed");
        e
    })?;

    info!(
        listen = %settings.listen,
        max_concurrent_jobs = settings.max_concurrent_jobs,
        "Starting server"
    );

    crate::http::start_server(settings, setup_shutdown_signal()).await
}

/// Validate the configuration file
#[instrument(skip_all)]
pub async fn validate_config(cli: &Cli, config: SystemConfig) -> Result<()> {
    info!("Validating configuration...");

    let settings = match config.validate().await {
        Ok(settings) => settings,
        Err(e) => {
            error!(
                config_path = %cli.config.display(),
                error = %e,
                "Configuration validation failed"
            );
            return Err(e);
        }
    };

    if let Err(e) = FormRenderer::new(settings.templates_dir.as_deref()) {
        error!(error = %e, "Form template is invalid");
        return Err(e);
    }

    info!(
        config_path = %cli.config.display(),
        listen = %settings.listen,
        temp_dir = %settings.temp_dir.display(),
        max_content_size = settings.max_content_size,
        max_concurrent_jobs = settings.max_concurrent_jobs,
        signer = %settings.signer_program,
        "Configuration is valid"
    );
    Ok(())
}

/// Show version and build information
#[instrument]
pub async fn show_version() -> Result<()> {
    println!("shortcut-signing-server {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();

    println!("Build Information:");
    println!(
        "  Build Profile: {}",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    );
    println!();

    println!("Runtime Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
