//! # carousight-core
//!
//! Core library for carousight - performance analytics for carousel content
//! accounts on TikTok and Instagram.
//!
//! This library provides:
//! - Domain types for posts, metric snapshots, and recommendations
//! - Database storage layer with SQLite
//! - Ingestion from a scraping provider, backfill of generation metadata and
//!   visual attribute extraction
//! - Aggregate analysis, LLM-backed recommendations, and the feedback config
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through the pipeline in one direction:
//!
//! ```text
//! scraper ──► db ──► analytics ──► recommend ──► (human approval) ──► feedback
//!              ▲                        │
//!          backfill                 dashboard
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use carousight_core::analytics::AccountAnalyzer;
//! use carousight_core::{Config, Database};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let report = AccountAnalyzer::new(&db).full_report("dreamtimelullabies").unwrap();
//! println!("{} posts", report.summary.map(|s| s.total_posts).unwrap_or(0));
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod backfill;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod feedback;
pub mod format;
pub mod logging;
pub mod recommend;
pub mod scraper;
pub mod types;
pub mod visuals;
