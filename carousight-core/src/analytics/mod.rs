//! Analytics module for carousight
//!
//! Pure read-side aggregation over the stored posts and their latest
//! snapshots:
//! - Format and content pillar comparisons
//! - Top and bottom performers
//! - 80/20 (pareto) ranking by total views produced
//! - Hook score and slide count breakdowns
//!
//! Nothing here writes to the database.

pub mod analyzer;
pub mod pareto;

pub use analyzer::{AccountAnalyzer, AccountReport, Focus, FocusReport, DEFAULT_POST_LIMIT};
pub use pareto::{ParetoAnalysis, ParetoEntry};
