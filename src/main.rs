mod attribution;
mod auth;
mod cli;
mod error;
mod github;
mod insights;
mod metrics;
mod models;
mod store;
mod sync;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting ShipLens - Delivery Performance Insights Tool");
    cli.execute().await?;

    Ok(())
}
