//! Steps shared by the interactive CLI and the scheduled binaries.

use crate::report::{print_backfill, print_batch, print_scrape_report};
use anyhow::{Context, Result};
use carousight_core::backfill::BackfillMatcher;
use carousight_core::recommend::{create_llm_client, Recommender};
use carousight_core::scraper::{configured_profiles, AccountScraper, ApifyClient, ScrapeReport};
use carousight_core::{Config, Database};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn open_database(config: &Config) -> Result<Database> {
    let db_path = config.database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

/// Configured account names, or every account in the database when the
/// config lists none.
pub fn known_accounts(config: &Config, db: &Database) -> Result<Vec<String>> {
    let names = config.account_names();
    if !names.is_empty() {
        return Ok(names);
    }
    db.list_accounts().context("failed to list accounts")
}

/// Scrape every configured profile, then backfill accounts that have a
/// generated-content directory.
pub fn scrape_and_backfill(config: &Config, db: &Database, verbose: bool) -> Result<ScrapeReport> {
    let profiles = configured_profiles(config).context("invalid account configuration")?;
    if profiles.is_empty() {
        println!("No accounts configured. Add [[accounts]] to {}", Config::config_path().display());
        return Ok(ScrapeReport::new());
    }

    let client = ApifyClient::new(&config.scraper).context("failed to create scraper client")?;
    let scraper = AccountScraper::new(db, &client, config.scraper.results_limit);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = scraper.scrape_all_with_progress(&profiles, |account, platform| {
        spinner.set_message(format!("Scraping {} on {}...", account, platform.display_name()));
    });
    spinner.finish_and_clear();

    print_scrape_report(&report);

    let matcher = BackfillMatcher::new(db, config.backfill.similarity_threshold);
    for account in &config.accounts {
        let Some(output_dir) = &account.output_dir else {
            continue;
        };
        match matcher.backfill_account(&account.name, output_dir) {
            Ok(backfill) => print_backfill(&account.name, &backfill, verbose),
            Err(e) => {
                tracing::error!(account = %account.name, error = %e, "Backfill failed");
                println!("{}: backfill failed: {}", account.name, e);
            }
        }
    }

    tracing::info!(accounts = report.len(), "Scrape pass complete");
    Ok(report)
}

/// Generate recommendations for each account in turn.
pub fn recommend_accounts(config: &Config, db: &Database, accounts: &[String]) -> Result<()> {
    let client = create_llm_client(&config.llm).context("failed to create LLM client")?;
    let recommender = Recommender::new(db, client.as_ref());

    for account in accounts {
        let batch = recommender
            .generate(account)
            .with_context(|| format!("failed to generate recommendations for {account}"))?;
        print_batch(account, &batch);
    }
    Ok(())
}
