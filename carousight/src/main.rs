//! carousight - carousel performance analytics
//!
//! Reports on scraped carousel posts, refreshes metrics, asks an LLM for
//! strategy recommendations and walks a human through approving them.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/carousight/analytics.db (~/.local/share/carousight/analytics.db)
//! - Logs: $XDG_STATE_HOME/carousight/carousight.log.YYYY-MM-DD (~/.local/state/carousight/)
//! - Config: $XDG_CONFIG_HOME/carousight/config.toml (~/.config/carousight/config.toml)

mod approve;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use carousight_core::analytics::{AccountAnalyzer, Focus};
use carousight_core::dashboard::write_dashboard;
use carousight_core::feedback::apply_approved;
use carousight_core::{Config, Database};
use clap::{ArgGroup, CommandFactory, Parser, ValueEnum};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "carousight")]
#[command(about = "Carousel content performance analytics")]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["dashboard", "scrape", "recommend"])))]
struct Args {
    /// Account to report on
    #[arg(short, long)]
    account: Option<String>,

    /// Report on every account
    #[arg(long, conflicts_with = "account")]
    all: bool,

    /// Restrict the report to one dimension
    #[arg(long, conflicts_with_all = ["dashboard", "scrape", "recommend"])]
    focus: Option<Focus>,

    /// Write the HTML dashboard (needs --account or --all)
    #[arg(long)]
    dashboard: bool,

    /// Scrape fresh metrics for every configured account
    #[arg(long)]
    scrape: bool,

    /// Generate recommendations (for --account, or every account)
    #[arg(long)]
    recommend: bool,

    /// Output format for reports
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print the report without reviewing pending recommendations
    /// (implied by --format json)
    #[arg(long)]
    no_review: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        carousight_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("carousight starting");

    if args.scrape {
        let db = pipeline::open_database(&config)?;
        pipeline::scrape_and_backfill(&config, &db, args.verbose)?;
        return Ok(());
    }

    if args.recommend {
        let db = pipeline::open_database(&config)?;
        let accounts = match &args.account {
            Some(account) => vec![account.clone()],
            None => pipeline::known_accounts(&config, &db)?,
        };
        return pipeline::recommend_accounts(&config, &db, &accounts);
    }

    if args.dashboard {
        if args.account.is_none() && !args.all {
            anyhow::bail!("--dashboard needs --account NAME or --all");
        }
        let db = pipeline::open_database(&config)?;
        let accounts = selected_accounts(&args, &config, &db)?;
        let reports = AccountAnalyzer::new(&db)
            .cross_account_report(&accounts)
            .context("failed to build reports")?;
        let path = write_dashboard(&reports, &config.dashboard_dir())
            .context("failed to write dashboard")?;
        println!("Dashboard written to {}", path.display());
        return Ok(());
    }

    if args.account.is_none() && !args.all {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let db = pipeline::open_database(&config)?;
    let accounts = selected_accounts(&args, &config, &db)?;
    if accounts.is_empty() {
        println!("No accounts found. Configure [[accounts]] and run with --scrape.");
        return Ok(());
    }

    print_reports(&args, &db, &accounts)?;

    if let (Some(account), false) = (&args.account, args.no_review) {
        if args.format == OutputFormat::Json {
            // stdout carries the JSON document only
            let pending = db.get_pending_recommendations(account)?.len();
            if pending > 0 {
                tracing::info!(account = %account, pending, "Review skipped for JSON output");
                eprintln!(
                    "{} pending recommendation(s) for {}; run without --format json to review",
                    pending, account
                );
            }
        } else {
            review(&config, &db, account)?;
        }
    }

    Ok(())
}

fn selected_accounts(args: &Args, config: &Config, db: &Database) -> Result<Vec<String>> {
    match &args.account {
        Some(account) => Ok(vec![account.clone()]),
        None => pipeline::known_accounts(config, db),
    }
}

fn print_reports(args: &Args, db: &Database, accounts: &[String]) -> Result<()> {
    let analyzer = AccountAnalyzer::new(db);

    match (args.focus, args.format) {
        (Some(focus), OutputFormat::Json) => {
            let mut focused = BTreeMap::new();
            for account in accounts {
                focused.insert(account.clone(), analyzer.focus_report(account, focus)?);
            }
            println!("{}", serde_json::to_string_pretty(&focused)?);
        }
        (Some(focus), OutputFormat::Text) => {
            for account in accounts {
                report::print_focus(account, &analyzer.focus_report(account, focus)?);
            }
        }
        (None, OutputFormat::Json) => {
            let reports = analyzer.cross_account_report(accounts)?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        (None, OutputFormat::Text) => {
            for account in accounts {
                report::print_report(&analyzer.full_report(account)?, args.verbose);
            }
        }
    }
    Ok(())
}

fn review(config: &Config, db: &Database, account: &str) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    let summary = approve::review_pending(db, account, &mut input, &mut out)
        .context("failed to review recommendations")?;

    if summary.approved + summary.rejected + summary.skipped > 0 {
        println!(
            "Reviewed: {} approved, {} rejected, {} skipped",
            summary.approved, summary.rejected, summary.skipped
        );
    }

    if summary.approved > 0 {
        let path = config.context_path(account);
        let outcome =
            apply_approved(db, account, &path).context("failed to update performance context")?;
        println!(
            "Applied {} recommendation(s) to {}",
            outcome.applied.len(),
            outcome.path.display()
        );
        if !outcome.failed.is_empty() {
            println!(
                "{} recommendation(s) could not be applied; see the log for details",
                outcome.failed.len()
            );
        }
    }
    Ok(())
}
