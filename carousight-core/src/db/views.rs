//! Aggregate reads over the reporting views.
//!
//! Every query here reads `v_post_performance`, so each post contributes
//! exactly one row: its most recent snapshot.

use super::repo::{parse_ts, Database};
use crate::error::Result;
use crate::types::{EngagementCounts, Post};
use crate::visuals::{PostVisuals, VisualAttribute};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;

/// A post with its latest metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPerformance {
    #[serde(flatten)]
    pub post: Post,
    #[serde(flatten)]
    pub counts: EngagementCounts,
    pub engagement_rate: f64,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Averages for one format or pillar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub name: String,
    pub post_count: i64,
    pub avg_views: f64,
    pub avg_likes: f64,
    pub avg_saves: f64,
    pub avg_engagement_rate: f64,
}

/// A post's latest metrics alongside its visual profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualPerformance {
    #[serde(flatten)]
    pub performance: PostPerformance,
    pub visuals: PostVisuals,
}

/// Account-level totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub account: String,
    pub total_posts: i64,
    pub avg_views: f64,
    pub avg_engagement_rate: f64,
    pub total_views: i64,
    pub best_views: i64,
}

/// Posts grouped by the integer part of their hook score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookScoreBucket {
    pub hook_score: i64,
    pub avg_views: f64,
    pub avg_engagement_rate: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideCountStats {
    pub slide_count: i64,
    pub avg_views: f64,
    pub avg_saves: f64,
    pub avg_engagement_rate: f64,
    pub count: i64,
}

impl Database {
    /// Every post of an account with its latest snapshot, best first
    pub fn latest_performance(&self, account: &str) -> Result<Vec<PostPerformance>> {
        self.performance_query(
            "SELECT * FROM v_post_performance WHERE account_name = ?1 ORDER BY views DESC, id",
            account,
            None,
        )
    }

    /// Top `n` posts by views
    pub fn top_posts_by_views(&self, account: &str, n: usize) -> Result<Vec<PostPerformance>> {
        self.performance_query(
            "SELECT * FROM v_post_performance WHERE account_name = ?1 ORDER BY views DESC, id LIMIT ?2",
            account,
            Some(n),
        )
    }

    /// Bottom `n` posts by views
    pub fn bottom_posts_by_views(&self, account: &str, n: usize) -> Result<Vec<PostPerformance>> {
        self.performance_query(
            "SELECT * FROM v_post_performance WHERE account_name = ?1 ORDER BY views ASC, id LIMIT ?2",
            account,
            Some(n),
        )
    }

    fn performance_query(
        &self,
        sql: &str,
        account: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PostPerformance>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = match limit {
            Some(n) => stmt
                .query_map(rusqlite::params![account, n as i64], row_to_performance)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([account], row_to_performance)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    /// Per-format averages; posts without a format are left out
    pub fn format_comparison(&self, account: &str) -> Result<Vec<GroupStats>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT format AS name, post_count, avg_views, avg_likes, avg_saves, avg_engagement_rate
            FROM v_format_comparison
            WHERE account_name = ? AND format IS NOT NULL AND format != ''
            ORDER BY format
            "#,
        )?;
        let rows = stmt
            .query_map([account], row_to_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Per-pillar averages; posts without a pillar are left out
    pub fn pillar_breakdown(&self, account: &str) -> Result<Vec<GroupStats>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT content_pillar AS name,
                   COUNT(*)             AS post_count,
                   AVG(views)           AS avg_views,
                   AVG(likes)           AS avg_likes,
                   AVG(saves)           AS avg_saves,
                   AVG(engagement_rate) AS avg_engagement_rate
            FROM v_post_performance
            WHERE account_name = ? AND content_pillar IS NOT NULL
            GROUP BY content_pillar
            ORDER BY content_pillar
            "#,
        )?;
        let rows = stmt
            .query_map([account], row_to_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Measured posts of an account that have a visual profile, best first
    pub fn get_visuals_for_account(&self, account: &str) -> Result<Vec<VisualPerformance>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM v_visual_performance WHERE account_name = ? ORDER BY views DESC, id",
        )?;
        let rows = stmt
            .query_map([account], |row| {
                Ok(VisualPerformance {
                    performance: row_to_performance(row)?,
                    visuals: Database::row_to_visuals(row)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Averages per dominant value of one visual attribute
    pub fn visual_breakdown(&self, account: &str, attribute: VisualAttribute) -> Result<Vec<GroupStats>> {
        // column names come from the closed attribute set
        let column = attribute.as_str();
        let sql = format!(
            r#"
            SELECT {column} AS name,
                   COUNT(*)             AS post_count,
                   AVG(views)           AS avg_views,
                   AVG(likes)           AS avg_likes,
                   AVG(saves)           AS avg_saves,
                   AVG(engagement_rate) AS avg_engagement_rate
            FROM v_visual_performance
            WHERE account_name = ? AND {column} IS NOT NULL
            GROUP BY {column}
            ORDER BY avg_views DESC, {column}
            "#
        );
        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([account], row_to_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Account totals, or `None` when the account has no measured posts
    pub fn account_summary(&self, account: &str) -> Result<Option<AccountSummary>> {
        let conn = self.lock();
        let summary = conn
            .query_row(
                "SELECT * FROM v_account_summary WHERE account_name = ?",
                [account],
                |row| {
                    Ok(AccountSummary {
                        account: row.get("account_name")?,
                        total_posts: row.get("total_posts")?,
                        avg_views: row.get("avg_views")?,
                        avg_engagement_rate: row.get("avg_engagement_rate")?,
                        total_views: row.get("total_views")?,
                        best_views: row.get("best_views")?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    /// Averages grouped by `CAST(hook_score AS INTEGER)`, ascending
    pub fn hook_score_buckets(&self, account: &str) -> Result<Vec<HookScoreBucket>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(hook_score AS INTEGER) AS bucket,
                   AVG(views)           AS avg_views,
                   AVG(engagement_rate) AS avg_engagement_rate,
                   COUNT(*)             AS count
            FROM v_post_performance
            WHERE account_name = ? AND hook_score IS NOT NULL
            GROUP BY bucket
            ORDER BY bucket
            "#,
        )?;
        let rows = stmt
            .query_map([account], |row| {
                Ok(HookScoreBucket {
                    hook_score: row.get("bucket")?,
                    avg_views: row.get("avg_views")?,
                    avg_engagement_rate: row.get("avg_engagement_rate")?,
                    count: row.get("count")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Averages per slide count, ascending
    pub fn slide_count_breakdown(&self, account: &str) -> Result<Vec<SlideCountStats>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT slide_count,
                   AVG(views)           AS avg_views,
                   AVG(saves)           AS avg_saves,
                   AVG(engagement_rate) AS avg_engagement_rate,
                   COUNT(*)             AS count
            FROM v_post_performance
            WHERE account_name = ? AND slide_count IS NOT NULL
            GROUP BY slide_count
            ORDER BY slide_count
            "#,
        )?;
        let rows = stmt
            .query_map([account], |row| {
                Ok(SlideCountStats {
                    slide_count: row.get("slide_count")?,
                    avg_views: row.get("avg_views")?,
                    avg_saves: row.get("avg_saves")?,
                    avg_engagement_rate: row.get("avg_engagement_rate")?,
                    count: row.get("count")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_to_performance(row: &Row) -> rusqlite::Result<PostPerformance> {
    let scraped_at: Option<String> = row.get("scraped_at")?;
    Ok(PostPerformance {
        post: Database::row_to_post(row)?,
        counts: Database::row_to_counts(row)?,
        engagement_rate: row.get("engagement_rate")?,
        scraped_at: scraped_at.as_deref().and_then(parse_ts),
    })
}

fn row_to_group(row: &Row) -> rusqlite::Result<GroupStats> {
    Ok(GroupStats {
        name: row.get("name")?,
        post_count: row.get("post_count")?,
        avg_views: row.get("avg_views")?,
        avg_likes: row.get("avg_likes")?,
        avg_saves: row.get("avg_saves")?,
        avg_engagement_rate: row.get("avg_engagement_rate")?,
    })
}
