//! carousight-scrape - scheduled metrics refresh
//!
//! Scrapes every configured account on every platform, then backfills
//! generation metadata for accounts with an output directory. Meant for cron.

#[allow(dead_code)]
mod pipeline;
#[allow(dead_code)]
mod report;

use anyhow::{Context, Result};
use carousight_core::scraper::ScrapeOutcome;
use carousight_core::Config;
use clap::Parser;

#[derive(Parser)]
#[command(name = "carousight-scrape")]
#[command(about = "Scrape metrics for all configured carousel accounts")]
#[command(version)]
struct Args {
    /// Verbose output (list backfill matches)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        carousight_core::logging::init_scheduled(&config.logging).context("failed to initialize logging")?;

    tracing::info!("carousight-scrape starting");

    let db = pipeline::open_database(&config)?;
    let report = pipeline::scrape_and_backfill(&config, &db, args.verbose)?;

    let failed = report
        .values()
        .flat_map(|platforms| platforms.values())
        .filter(|outcome| matches!(outcome, ScrapeOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        tracing::warn!(failed, "Some profiles failed to scrape");
    }

    tracing::info!("carousight-scrape complete");
    Ok(())
}
