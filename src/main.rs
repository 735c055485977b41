mod cli;
mod config;
mod http;
mod logging;
mod metrics;
mod signing;
mod types;

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Cli, Commands, ServeArgs};
use crate::config::SystemConfig;
use crate::types::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Version needs no configuration file
    let loaded = match &cli.command {
        Some(Commands::Version) => Ok(SystemConfig::default()),
        _ => SystemConfig::load_or_default(&cli.config),
    };

    // Log through whatever we could load so a broken file is still reported
    let mut logging_config = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    cli.apply_logging_overrides(&mut logging_config);
    crate::logging::init(&logging_config)?;

    let mut system_config = loaded.map_err(|e| {
        error!(
            config_path = %cli.config.display(),
            error = %e,
            "Failed to load configuration"
        );
        e
    })?;
    system_config.logging = logging_config;
    if !matches!(cli.command, Some(Commands::Version)) && !cli.config.exists() {
        info!(
            config_path = %cli.config.display(),
            "No configuration file, using built-in defaults"
        );
    }

    crate::metrics::init_metrics();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting shortcut-signing-server");

    match cli
        .command
        .clone()
        .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
    {
        Commands::Serve(args) => cli::run_server(args, system_config).await,
        Commands::Validate => cli::validate_config(&cli, system_config).await,
        Commands::Version => cli::show_version().await,
    }
}
