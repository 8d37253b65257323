//! NatureIn CLI - authenticated access to the NatureIn API

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use config::CliConfig;
use naturein_core::tracing::{InstrumentationConfig, init_tracing};
use naturein_core::{FileCredentialStore, StateDir};
use naturein_http::{ApiClient, ClientError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "naturein")]
#[command(about = "Command line client for the NatureIn API")]
#[command(version)]
struct Cli {
    /// Set logging level (defaults to `log.level` from the config)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<LogLevel>,

    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let state_dir = StateDir::new();
    let mut config = CliConfig::load(cli.config.as_deref(), &state_dir)?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    let log_level = cli.log_level.map_or_else(
        || config.log.level.clone(),
        |level| Level::from(level).as_str().to_lowercase(),
    );
    let mut instrumentation = InstrumentationConfig::from_env().with_log_level(log_level);
    instrumentation.json |= config.log.json;
    init_tracing(&instrumentation)?;

    debug!(base_url = %config.api.base_url, "Starting NatureIn CLI");
    state_dir.create_directories().await?;

    let store = FileCredentialStore::new(config.credentials_file.clone());
    let client = ApiClient::builder()
        .base_url(config.api.base_url.clone())
        .timeout(config.api.timeout())
        .refresh_path(config.api.refresh_path.clone())
        .credential_store(Arc::new(store))
        .build()?;

    let is_login = matches!(cli.command, Commands::Login { .. });
    if let Err(e) = cli.command.execute(&client, &config).await {
        error!("Command failed: {e}");
        if let Some(hint) = login_hint(is_login, &e) {
            error!("{hint}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Suggest logging in when a command was rejected for lack of a session.
///
/// A failed login is a rejected password, not an expired session.
fn login_hint(is_login: bool, err: &anyhow::Error) -> Option<&'static str> {
    let expired = err
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_auth_expired);
    (expired && !is_login)
        .then_some("Not logged in or session expired, run `naturein login <username>`")
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
