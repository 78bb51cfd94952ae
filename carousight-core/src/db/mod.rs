//! Database layer for carousight
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for posts, snapshots, recommendations and visuals
//! - Read-only aggregate queries over the reporting views

pub mod repo;
pub mod schema;
pub mod views;

pub use repo::Database;
pub use views::{
    AccountSummary, GroupStats, HookScoreBucket, PostPerformance, SlideCountStats,
    VisualPerformance,
};
