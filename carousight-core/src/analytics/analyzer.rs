//! Account-level performance analysis.

use super::pareto::ParetoAnalysis;
use crate::db::{AccountSummary, Database, GroupStats, HookScoreBucket, PostPerformance, SlideCountStats};
use crate::error::Result;
use crate::visuals::VisualAttribute;
use serde::Serialize;
use std::collections::BTreeMap;

/// How many posts the top/bottom lists hold by default
pub const DEFAULT_POST_LIMIT: usize = 5;

/// Complete analysis of one account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountReport {
    pub account: String,
    /// `None` when the account has no measured posts
    pub summary: Option<AccountSummary>,
    pub formats: Vec<GroupStats>,
    pub pillars: Vec<GroupStats>,
    pub top_posts: Vec<PostPerformance>,
    pub bottom_posts: Vec<PostPerformance>,
    pub pareto: ParetoAnalysis,
    pub hook_correlation: Vec<HookScoreBucket>,
    pub slide_counts: Vec<SlideCountStats>,
    /// Per visual attribute, best value first. Absent until visuals exist.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub visuals: BTreeMap<VisualAttribute, Vec<GroupStats>>,
}

impl AccountReport {
    /// True when there is nothing to analyze
    pub fn is_empty(&self) -> bool {
        self.summary.as_ref().map_or(true, |s| s.total_posts == 0)
    }
}

/// One analysis dimension, for a focused report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Formats,
    Pillars,
    Hooks,
    Failures,
    Slides,
}

impl Focus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::Formats => "formats",
            Focus::Pillars => "pillars",
            Focus::Hooks => "hooks",
            Focus::Failures => "failures",
            Focus::Slides => "slides",
        }
    }
}

impl std::str::FromStr for Focus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "formats" => Ok(Focus::Formats),
            "pillars" => Ok(Focus::Pillars),
            "hooks" => Ok(Focus::Hooks),
            "failures" => Ok(Focus::Failures),
            "slides" => Ok(Focus::Slides),
            _ => Err(format!(
                "unknown focus: {} (expected formats, pillars, hooks, failures or slides)",
                s
            )),
        }
    }
}

/// A report restricted to one dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "focus", rename_all = "snake_case")]
pub enum FocusReport {
    Formats {
        formats: Vec<GroupStats>,
        ranking: Vec<super::ParetoEntry>,
    },
    Pillars {
        pillars: Vec<GroupStats>,
        ranking: Vec<super::ParetoEntry>,
    },
    Hooks {
        buckets: Vec<HookScoreBucket>,
    },
    Failures {
        bottom_posts: Vec<PostPerformance>,
        /// Formats of the failing posts, with how many failed
        formats: BTreeMap<String, usize>,
    },
    Slides {
        slide_counts: Vec<SlideCountStats>,
    },
}

/// Read-side analysis over the reporting views
pub struct AccountAnalyzer<'a> {
    db: &'a Database,
}

impl<'a> AccountAnalyzer<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn analyze_formats(&self, account: &str) -> Result<Vec<GroupStats>> {
        self.db.format_comparison(account)
    }

    pub fn analyze_pillars(&self, account: &str) -> Result<Vec<GroupStats>> {
        self.db.pillar_breakdown(account)
    }

    pub fn top_posts(&self, account: &str, n: usize) -> Result<Vec<PostPerformance>> {
        self.db.top_posts_by_views(account, n)
    }

    pub fn bottom_posts(&self, account: &str, n: usize) -> Result<Vec<PostPerformance>> {
        self.db.bottom_posts_by_views(account, n)
    }

    pub fn pareto_analysis(&self, account: &str) -> Result<ParetoAnalysis> {
        let formats = self.analyze_formats(account)?;
        let pillars = self.analyze_pillars(account)?;
        Ok(ParetoAnalysis::new(&formats, &pillars))
    }

    /// Does hook score predict performance? Grouped by integer score.
    pub fn hook_score_correlation(&self, account: &str) -> Result<Vec<HookScoreBucket>> {
        self.db.hook_score_buckets(account)
    }

    pub fn slide_count_analysis(&self, account: &str) -> Result<Vec<SlideCountStats>> {
        self.db.slide_count_breakdown(account)
    }

    /// Performance grouped by each visual attribute's dominant value.
    /// Attributes with no classified posts are left out.
    pub fn analyze_visuals(&self, account: &str) -> Result<BTreeMap<VisualAttribute, Vec<GroupStats>>> {
        let mut visuals = BTreeMap::new();
        for attribute in VisualAttribute::ALL {
            let groups = self.db.visual_breakdown(account, attribute)?;
            if !groups.is_empty() {
                visuals.insert(attribute, groups);
            }
        }
        Ok(visuals)
    }

    pub fn summary(&self, account: &str) -> Result<Option<AccountSummary>> {
        self.db.account_summary(account)
    }

    pub fn full_report(&self, account: &str) -> Result<AccountReport> {
        let formats = self.analyze_formats(account)?;
        let pillars = self.analyze_pillars(account)?;
        let pareto = ParetoAnalysis::new(&formats, &pillars);

        let report = AccountReport {
            account: account.to_string(),
            summary: self.summary(account)?,
            top_posts: self.top_posts(account, DEFAULT_POST_LIMIT)?,
            bottom_posts: self.bottom_posts(account, DEFAULT_POST_LIMIT)?,
            hook_correlation: self.hook_score_correlation(account)?,
            slide_counts: self.slide_count_analysis(account)?,
            visuals: self.analyze_visuals(account)?,
            formats,
            pillars,
            pareto,
        };

        tracing::debug!(
            account,
            formats = report.formats.len(),
            pillars = report.pillars.len(),
            "Built account report"
        );
        Ok(report)
    }

    /// Full reports for several accounts, keyed by account name
    pub fn cross_account_report(&self, accounts: &[String]) -> Result<BTreeMap<String, AccountReport>> {
        accounts
            .iter()
            .map(|name| Ok((name.clone(), self.full_report(name)?)))
            .collect()
    }

    pub fn focus_report(&self, account: &str, focus: Focus) -> Result<FocusReport> {
        Ok(match focus {
            Focus::Formats => {
                let formats = self.analyze_formats(account)?;
                let ranking = super::pareto::rank(&formats);
                FocusReport::Formats { formats, ranking }
            }
            Focus::Pillars => {
                let pillars = self.analyze_pillars(account)?;
                let ranking = super::pareto::rank(&pillars);
                FocusReport::Pillars { pillars, ranking }
            }
            Focus::Hooks => FocusReport::Hooks {
                buckets: self.hook_score_correlation(account)?,
            },
            Focus::Failures => {
                let bottom_posts = self.bottom_posts(account, DEFAULT_POST_LIMIT)?;
                let mut formats = BTreeMap::new();
                for post in &bottom_posts {
                    let format = post
                        .post
                        .format
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string());
                    *formats.entry(format).or_insert(0) += 1;
                }
                FocusReport::Failures {
                    bottom_posts,
                    formats,
                }
            }
            Focus::Slides => FocusReport::Slides {
                slide_counts: self.slide_count_analysis(account)?,
            },
        })
    }
}
