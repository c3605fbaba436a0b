//! hostkeep
//!
//! Gathers host facts and drives services, containers and pods through
//! idempotent lifecycle operations on the local machine.

use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use hostkeep_exec::LocalConnector;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let (config, source) = match &cli.config {
        Some(path) => (Config::load(path)?, Some(path.clone())),
        None => Config::load_default()?,
    };
    init_tracing(&config);
    debug!(?source, "configuration loaded");

    commands::run(cli.command, &config, Arc::new(LocalConnector::new())).await
}

/// Logs go to stderr so `facts --json` stays machine-readable
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
