//! carousight-recommend - scheduled recommendation pass
//!
//! Generates pending recommendations for every known account. Review happens
//! later through `carousight --account NAME`.

#[allow(dead_code)]
mod pipeline;
#[allow(dead_code)]
mod report;

use anyhow::{Context, Result};
use carousight_core::Config;
use clap::Parser;

#[derive(Parser)]
#[command(name = "carousight-recommend")]
#[command(about = "Generate strategy recommendations for all carousel accounts")]
#[command(version)]
struct Args {}

fn main() -> Result<()> {
    let _args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        carousight_core::logging::init_scheduled(&config.logging).context("failed to initialize logging")?;

    tracing::info!("carousight-recommend starting");

    let db = pipeline::open_database(&config)?;
    let accounts = pipeline::known_accounts(&config, &db)?;
    pipeline::recommend_accounts(&config, &db, &accounts)?;

    tracing::info!(accounts = accounts.len(), "carousight-recommend complete");
    Ok(())
}
