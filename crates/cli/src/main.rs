//! Authflow CLI - register, log in and inspect a session against an auth backend

mod commands;
mod config;
mod logging;

use anyhow::Result;
use authflow_session::SessionStore;
use clap::{Parser, ValueEnum};
use commands::Commands;
use config::Settings;
use logging::LogFormat;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "authflow")]
#[command(about = "Session client for a token + refresh-cookie auth backend")]
#[command(version)]
struct Cli {
    /// Set logging level (overrides the configured level)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<LogLevel>,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration file (TOML or YAML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the configured URL)
    #[arg(long, global = true, env = "AUTHFLOW_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        settings.api.base_url = base_url;
    }
    let level = cli
        .log_level
        .map_or_else(|| settings.log_level.clone(), |l| l.as_str().to_string());
    logging::init_logging(&level, cli.log_format)?;

    info!(base_url = %settings.api.base_url, "Starting authflow");

    let store = SessionStore::new(settings.client_builder())?;
    if let Err(e) = cli.command.execute(&store).await {
        error!("Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}
