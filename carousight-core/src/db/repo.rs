//! Database repository layer
//!
//! Provides query and insert operations for posts, metric snapshots,
//! recommendations and extracted visual attributes.

use crate::error::{Error, Result};
use crate::types::*;
use crate::visuals::{PostVisuals, VisualAttribute};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

/// Fixed-width RFC 3339 so that text order matches time order.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse a text column into one of the closed enums.
pub(crate) fn parse_enum<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// A panic while holding the lock leaves SQLite itself consistent, so a
    /// poisoned mutex is still usable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Post operations
    // ============================================

    /// Insert a post, or fill in the supplied fields of an existing one.
    ///
    /// Fields left as `None` keep their stored value, and the account and
    /// platform of an existing post are never rewritten. Returns `true` when
    /// the post was newly inserted.
    pub fn upsert_post(&self, post: &PostUpsert) -> Result<bool> {
        let conn = self.lock();
        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM posts WHERE post_id = ?",
                [&post.post_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        conn.execute(
            r#"
            INSERT INTO posts (
                account_name, platform, post_id, post_url, topic, format,
                hook_text, hook_score, slide_count, content_pillar,
                published_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(post_id) DO UPDATE SET
                post_url       = COALESCE(excluded.post_url, posts.post_url),
                topic          = COALESCE(excluded.topic, posts.topic),
                format         = COALESCE(excluded.format, posts.format),
                hook_text      = COALESCE(excluded.hook_text, posts.hook_text),
                hook_score     = COALESCE(excluded.hook_score, posts.hook_score),
                slide_count    = COALESCE(excluded.slide_count, posts.slide_count),
                content_pillar = COALESCE(excluded.content_pillar, posts.content_pillar),
                published_at   = COALESCE(excluded.published_at, posts.published_at)
            "#,
            params![
                post.account,
                post.platform.as_str(),
                post.post_id,
                post.url,
                post.topic,
                post.format,
                post.hook_text,
                post.hook_score,
                post.slide_count,
                post.content_pillar,
                post.published_at.map(format_ts),
                format_ts(Utc::now()),
            ],
        )?;

        if !existed {
            tracing::debug!(
                account = %post.account,
                platform = %post.platform,
                post_id = %post.post_id,
                "Registered new post"
            );
        }
        Ok(!existed)
    }

    /// Get a post by its platform id
    pub fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM posts WHERE post_id = ?",
            [post_id],
            Self::row_to_post,
        )
        .optional()
        .map_err(Error::from)
    }

    /// All posts for an account, most recently published first
    pub fn get_posts_for_account(&self, account: &str) -> Result<Vec<Post>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM posts
            WHERE account_name = ?
            ORDER BY published_at IS NULL, published_at DESC, id DESC
            "#,
        )?;
        let posts = stmt
            .query_map([account], Self::row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    /// Posts with no generation metadata yet (format unknown)
    pub fn get_unmatched_posts(&self, account: &str) -> Result<Vec<Post>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM posts
            WHERE account_name = ? AND (format IS NULL OR format = '')
            ORDER BY id
            "#,
        )?;
        let posts = stmt
            .query_map([account], Self::row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    /// Distinct account names that have at least one post
    pub fn list_accounts(&self) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT account_name FROM posts ORDER BY account_name")?;
        let accounts = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(accounts)
    }

    pub(crate) fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
        let published_at: Option<String> = row.get("published_at")?;
        let created_at: String = row.get("created_at")?;

        Ok(Post {
            id: row.get("id")?,
            account: row.get("account_name")?,
            platform: parse_enum(row, "platform")?,
            post_id: row.get("post_id")?,
            url: row.get("post_url")?,
            topic: row.get("topic")?,
            format: row.get("format")?,
            hook_text: row.get("hook_text")?,
            hook_score: row.get("hook_score")?,
            slide_count: row.get("slide_count")?,
            content_pillar: row.get("content_pillar")?,
            published_at: published_at.as_deref().and_then(parse_ts),
            created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
        })
    }

    // ============================================
    // Snapshot operations
    // ============================================

    /// Append a snapshot taken now. Returns the snapshot id.
    pub fn insert_snapshot(&self, post_id: &str, counts: &EngagementCounts) -> Result<i64> {
        self.insert_snapshot_at(post_id, counts, Utc::now())
    }

    /// Append a snapshot with an explicit capture time.
    ///
    /// The engagement rate is computed from `counts` and stored alongside.
    pub fn insert_snapshot_at(
        &self,
        post_id: &str,
        counts: &EngagementCounts,
        scraped_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.lock();
        let known: Option<i64> = conn
            .query_row("SELECT id FROM posts WHERE post_id = ?", [post_id], |r| {
                r.get(0)
            })
            .optional()?;
        if known.is_none() {
            return Err(Error::PostNotFound(post_id.to_string()));
        }

        conn.execute(
            r#"
            INSERT INTO metrics_snapshots
                (post_id, scraped_at, views, likes, comments, shares, saves, engagement_rate)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                post_id,
                format_ts(scraped_at),
                counts.views,
                counts.likes,
                counts.comments,
                counts.shares,
                counts.saves,
                counts.engagement_rate(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All snapshots for a post, oldest first
    pub fn get_snapshots(&self, post_id: &str) -> Result<Vec<MetricSnapshot>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM metrics_snapshots WHERE post_id = ? ORDER BY scraped_at, id",
        )?;
        let snapshots = stmt
            .query_map([post_id], Self::row_to_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    fn row_to_snapshot(row: &Row) -> rusqlite::Result<MetricSnapshot> {
        let scraped_at: String = row.get("scraped_at")?;
        Ok(MetricSnapshot {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            scraped_at: parse_ts(&scraped_at).unwrap_or_else(Utc::now),
            counts: Self::row_to_counts(row)?,
            engagement_rate: row.get("engagement_rate")?,
        })
    }

    pub(crate) fn row_to_counts(row: &Row) -> rusqlite::Result<EngagementCounts> {
        Ok(EngagementCounts {
            views: row.get("views")?,
            likes: row.get("likes")?,
            comments: row.get("comments")?,
            shares: row.get("shares")?,
            saves: row.get("saves")?,
        })
    }

    // ============================================
    // Recommendation operations
    // ============================================

    /// Store a draft as a pending recommendation. Returns its id.
    pub fn create_recommendation(&self, account: &str, draft: &RecommendationDraft) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO recommendations
                (account_name, created_at, status, category, insight, proposed_change, confidence)
            VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6)
            "#,
            params![
                account,
                format_ts(Utc::now()),
                draft.category.as_str(),
                draft.insight,
                serde_json::to_string(&draft.proposed_change)?,
                draft.confidence.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a recommendation by id
    pub fn get_recommendation(&self, id: i64) -> Result<Option<Recommendation>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM recommendations WHERE id = ?",
            [id],
            Self::row_to_recommendation,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Pending recommendations for an account, oldest first
    pub fn get_pending_recommendations(&self, account: &str) -> Result<Vec<Recommendation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM recommendations
            WHERE account_name = ? AND status = 'pending'
            ORDER BY created_at, id
            "#,
        )?;
        let recs = stmt
            .query_map([account], Self::row_to_recommendation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recs)
    }

    /// Approved recommendations for an account, in approval order
    pub fn get_approved_recommendations(&self, account: &str) -> Result<Vec<Recommendation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM recommendations
            WHERE account_name = ? AND status = 'approved'
            ORDER BY approved_at, id
            "#,
        )?;
        let recs = stmt
            .query_map([account], Self::row_to_recommendation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recs)
    }

    /// Move a pending recommendation to approved or rejected.
    ///
    /// Approving stamps `approved_at`; rejecting clears it. Any transition out
    /// of a non-pending state, or back to pending, is an error.
    pub fn update_recommendation_status(&self, id: i64, status: RecommendationStatus) -> Result<()> {
        let conn = self.lock();
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM recommendations WHERE id = ?",
                [id],
                |r| r.get(0),
            )
            .optional()?;

        let current = current.ok_or(Error::RecommendationNotFound(id))?;
        if current != RecommendationStatus::Pending.as_str()
            || status == RecommendationStatus::Pending
        {
            return Err(Error::InvalidTransition {
                id,
                status: current,
            });
        }

        let approved_at = match status {
            RecommendationStatus::Approved => Some(format_ts(Utc::now())),
            _ => None,
        };

        conn.execute(
            r#"
            UPDATE recommendations
            SET status = ?1, approved_at = ?2
            WHERE id = ?3 AND status = 'pending'
            "#,
            params![status.as_str(), approved_at, id],
        )?;

        tracing::info!(recommendation_id = id, status = %status, "Recommendation reviewed");
        Ok(())
    }

    fn row_to_recommendation(row: &Row) -> rusqlite::Result<Recommendation> {
        let created_at: String = row.get("created_at")?;
        let approved_at: Option<String> = row.get("approved_at")?;
        let change_str: String = row.get("proposed_change")?;
        let proposed_change = serde_json::from_str(&change_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(Recommendation {
            id: row.get("id")?,
            account: row.get("account_name")?,
            category: parse_enum(row, "category")?,
            insight: row.get("insight")?,
            proposed_change,
            confidence: parse_enum(row, "confidence")?,
            status: parse_enum(row, "status")?,
            created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
            approved_at: approved_at.as_deref().and_then(parse_ts),
        })
    }

    // ============================================
    // Visual operations
    // ============================================

    /// Store the visual profile of a post, replacing any earlier one.
    pub fn upsert_post_visuals(&self, post_id: &str, visuals: &PostVisuals) -> Result<()> {
        let mut values: Vec<Option<String>> = Vec::with_capacity(17);
        values.push(Some(post_id.to_string()));
        for attr in VisualAttribute::ALL {
            values.push(visuals.dominant.get(&attr).cloned());
        }
        for attr in VisualAttribute::ALL {
            values.push(visuals.hook.get(&attr).cloned());
        }
        values.push(Some(serde_json::to_string(&visuals.all_attributes)?));
        values.push(Some(format_ts(Utc::now())));

        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO post_visuals (
                post_id,
                photography_style, lighting, color_palette, composition,
                scene_setting, subject_focus, mood,
                hook_photography_style, hook_lighting, hook_color_palette, hook_composition,
                hook_scene_setting, hook_subject_focus, hook_mood,
                all_attributes_json, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(post_id) DO UPDATE SET
                photography_style      = excluded.photography_style,
                lighting               = excluded.lighting,
                color_palette          = excluded.color_palette,
                composition            = excluded.composition,
                scene_setting          = excluded.scene_setting,
                subject_focus          = excluded.subject_focus,
                mood                   = excluded.mood,
                hook_photography_style = excluded.hook_photography_style,
                hook_lighting          = excluded.hook_lighting,
                hook_color_palette     = excluded.hook_color_palette,
                hook_composition       = excluded.hook_composition,
                hook_scene_setting     = excluded.hook_scene_setting,
                hook_subject_focus     = excluded.hook_subject_focus,
                hook_mood              = excluded.hook_mood,
                all_attributes_json    = excluded.all_attributes_json
            "#,
            rusqlite::params_from_iter(values.iter()),
        )?;

        tracing::debug!(
            post_id,
            attributes = visuals.dominant.len(),
            "Stored visual attributes"
        );
        Ok(())
    }

    /// Visual profile of a post, if one was extracted
    pub fn get_post_visuals(&self, post_id: &str) -> Result<Option<PostVisuals>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM post_visuals WHERE post_id = ?",
            [post_id],
            Self::row_to_visuals,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Matched posts (format known) that have no visual profile yet
    pub fn get_posts_missing_visuals(&self, account: &str) -> Result<Vec<Post>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT p.* FROM posts p
            LEFT JOIN post_visuals pv ON pv.post_id = p.post_id
            WHERE p.account_name = ?
              AND p.format IS NOT NULL AND p.format != ''
              AND pv.id IS NULL
            ORDER BY p.id
            "#,
        )?;
        let posts = stmt
            .query_map([account], Self::row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    pub(crate) fn row_to_visuals(row: &Row) -> rusqlite::Result<PostVisuals> {
        let mut visuals = PostVisuals::default();
        for attr in VisualAttribute::ALL {
            if let Some(value) = row.get::<_, Option<String>>(attr.as_str())? {
                visuals.dominant.insert(attr, value);
            }
            let hook_column = format!("hook_{}", attr);
            if let Some(value) = row.get::<_, Option<String>>(hook_column.as_str())? {
                visuals.hook.insert(attr, value);
            }
        }
        let all_json: String = row.get("all_attributes_json")?;
        visuals.all_attributes = serde_json::from_str(&all_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(visuals)
    }
}
