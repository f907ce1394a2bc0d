mod auth;
mod cli;
mod config;
mod error;
mod models;
mod prompt;
mod providers;
mod reports;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting tfs-query");
    cli.execute().await?;

    Ok(())
}
