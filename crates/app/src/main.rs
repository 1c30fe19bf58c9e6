mod cli;
mod commands;
mod config;
mod notice;
mod state;
mod views;
mod wiring;

use clap::Parser;
use thiserror::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::commands::CommandError;
use crate::config::ConfigError;
use crate::wiring::WiringError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("{0}")]
    Command(#[from] CommandError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    config::load_dotenv()?;
    let config = config::AppConfig::from_env()?;
    let state = wiring::build_state(config, cli.mock)?;

    if let Err(err) = commands::run(&state, cli.command, cli.json).await {
        error!(error = %err, "command failed");
        return Err(err.into());
    }
    Ok(())
}
