//! Ingestion of published posts and their metrics.
//!
//! A [`PostSource`] fetches recent posts for one platform profile; the
//! [`AccountScraper`] registers new posts and appends a metric snapshot for
//! every post it sees, new or not.

pub mod apify;
pub mod normalize;

pub use apify::ApifyClient;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::types::{EngagementCounts, Platform, PostUpsert};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Hook text for newly registered posts is the caption cut to this many chars
pub const HOOK_TEXT_MAX_CHARS: usize = 200;

/// A normalized post as returned by a source
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPost {
    pub post_id: String,
    pub url: Option<String>,
    pub caption: String,
    pub published_at: Option<DateTime<Utc>>,
    pub counts: EngagementCounts,
}

/// Anything that can list a profile's recent posts.
pub trait PostSource {
    fn fetch_posts(&self, platform: Platform, username: &str, limit: usize) -> Result<Vec<ScrapedPost>>;
}

/// Counts for one (account, platform) pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeResult {
    pub new_posts: usize,
    pub updated_posts: usize,
}

/// Outcome of one unit in a multi-account pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScrapeOutcome {
    Done(ScrapeResult),
    Failed { error: String },
}

/// account → platform → outcome
pub type ScrapeReport = BTreeMap<String, BTreeMap<Platform, ScrapeOutcome>>;

/// account → [(platform, username)]
pub type PlatformProfiles = BTreeMap<String, Vec<(Platform, String)>>;

/// Profiles of every configured account
pub fn configured_profiles(config: &Config) -> Result<PlatformProfiles> {
    config
        .accounts
        .iter()
        .map(|account| Ok((account.name.clone(), account.platform_profiles()?)))
        .collect()
}

pub struct AccountScraper<'a> {
    db: &'a Database,
    source: &'a dyn PostSource,
    limit: usize,
}

impl<'a> AccountScraper<'a> {
    pub fn new(db: &'a Database, source: &'a dyn PostSource, limit: usize) -> Self {
        Self {
            db,
            source,
            limit: limit.max(1),
        }
    }

    /// Fetch one profile and store what came back.
    ///
    /// Posts seen for the first time are registered with the caption as hook
    /// text. Every fetched post, new or known, gets a fresh snapshot.
    pub fn scrape_account(&self, account: &str, platform: Platform, username: &str) -> Result<ScrapeResult> {
        tracing::info!(account, platform = %platform, username, "Scraping profile");
        let posts = self.source.fetch_posts(platform, username, self.limit)?;

        let mut result = ScrapeResult::default();
        for post in posts {
            if self.db.get_post(&post.post_id)?.is_some() {
                result.updated_posts += 1;
            } else {
                let mut upsert = PostUpsert::new(account, platform, &post.post_id);
                upsert.url = post.url.clone();
                upsert.hook_text = Some(truncate_hook(&post.caption));
                upsert.published_at = post.published_at;
                self.db.upsert_post(&upsert)?;
                result.new_posts += 1;
            }

            self.db.insert_snapshot(&post.post_id, &post.counts)?;
            tracing::debug!(
                account,
                post_id = %post.post_id,
                views = post.counts.views,
                saves = post.counts.saves,
                "Recorded snapshot"
            );
        }

        tracing::info!(
            account,
            platform = %platform,
            new_posts = result.new_posts,
            updated_posts = result.updated_posts,
            "Scrape complete"
        );
        Ok(result)
    }

    /// Scrape every profile, isolating failures per unit.
    pub fn scrape_all(&self, profiles: &PlatformProfiles) -> ScrapeReport {
        self.scrape_all_with_progress(profiles, |_, _| {})
    }

    /// Like [`scrape_all`](Self::scrape_all), calling `on_unit` before each unit starts.
    pub fn scrape_all_with_progress<F>(&self, profiles: &PlatformProfiles, mut on_unit: F) -> ScrapeReport
    where
        F: FnMut(&str, Platform),
    {
        let mut report = ScrapeReport::new();
        for (account, platforms) in profiles {
            let entry = report.entry(account.clone()).or_default();
            for (platform, username) in platforms {
                on_unit(account, *platform);
                let outcome = match self.scrape_account(account, *platform, username) {
                    Ok(result) => ScrapeOutcome::Done(result),
                    Err(e) => {
                        tracing::error!(
                            account = %account,
                            platform = %platform,
                            error = %e,
                            "Failed to scrape profile"
                        );
                        ScrapeOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                entry.insert(*platform, outcome);
            }
        }
        report
    }
}

/// Caption cut to [`HOOK_TEXT_MAX_CHARS`] characters, with no ellipsis.
fn truncate_hook(caption: &str) -> String {
    if caption.chars().count() <= HOOK_TEXT_MAX_CHARS {
        caption.to_string()
    } else {
        caption.chars().take(HOOK_TEXT_MAX_CHARS).collect()
    }
}
