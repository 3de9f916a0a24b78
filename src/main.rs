mod bot;
mod cli;
mod config;
mod error;
mod model;
mod notify;
mod providers;
mod schedule;
mod tracking;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bot::Bot;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("filter_watch=info")),
        )
        .init();

    let cli = Cli::parse();

    // Load config
    let config = config::load_config(cli.config.as_deref())?;
    let bot = Bot::from_config(config)?;

    let ladder = bot.ladder();
    tracing::info!(
        filters = bot.config().filters.len(),
        priorities = ?ladder.names(),
        priority_field = ladder.field(),
        fallback = ladder.fallback(),
        "Configuration loaded"
    );

    match cli.command() {
        Command::Run => schedule::run(&bot).await,
        Command::Once => {
            let failed = bot.run_all().await;
            if failed > 0 {
                bail!("{failed} filter check(s) failed");
            }
            Ok(())
        }
    }
}
