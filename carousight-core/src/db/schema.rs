//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: posts, snapshots, recommendations
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        account_name     TEXT NOT NULL,
        platform         TEXT NOT NULL,
        post_id          TEXT NOT NULL UNIQUE,
        post_url         TEXT,
        topic            TEXT,
        format           TEXT,
        hook_text        TEXT,
        hook_score       REAL,
        slide_count      INTEGER,
        content_pillar   TEXT,
        published_at     DATETIME,
        created_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_posts_account ON posts(account_name);

    -- Append-only: rows are never updated
    CREATE TABLE IF NOT EXISTS metrics_snapshots (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id          TEXT NOT NULL REFERENCES posts(post_id),
        scraped_at       DATETIME NOT NULL,
        views            INTEGER NOT NULL DEFAULT 0,
        likes            INTEGER NOT NULL DEFAULT 0,
        comments         INTEGER NOT NULL DEFAULT 0,
        shares           INTEGER NOT NULL DEFAULT 0,
        saves            INTEGER NOT NULL DEFAULT 0,
        engagement_rate  REAL NOT NULL DEFAULT 0.0
    );

    CREATE INDEX IF NOT EXISTS idx_snapshots_post ON metrics_snapshots(post_id, scraped_at);

    CREATE TABLE IF NOT EXISTS recommendations (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        account_name     TEXT NOT NULL,
        created_at       DATETIME NOT NULL,
        status           TEXT NOT NULL DEFAULT 'pending',
        category         TEXT NOT NULL,
        insight          TEXT NOT NULL,
        proposed_change  JSON NOT NULL,
        confidence       TEXT NOT NULL DEFAULT 'medium',
        approved_at      DATETIME
    );

    CREATE INDEX IF NOT EXISTS idx_recommendations_account
        ON recommendations(account_name, status);
    "#,
    // Version 2: reporting views
    r#"
    -- Each post joined with its most recent snapshot only
    CREATE VIEW IF NOT EXISTS v_post_performance AS
    SELECT
        p.id, p.account_name, p.platform, p.post_id, p.post_url,
        p.topic, p.format, p.hook_text, p.hook_score, p.slide_count,
        p.content_pillar, p.published_at, p.created_at,
        ms.views, ms.likes, ms.comments, ms.shares, ms.saves,
        ms.engagement_rate, ms.scraped_at
    FROM posts p
    JOIN metrics_snapshots ms ON p.post_id = ms.post_id
    WHERE ms.id = (
        SELECT m2.id FROM metrics_snapshots m2
        WHERE m2.post_id = p.post_id
        ORDER BY m2.scraped_at DESC, m2.id DESC
        LIMIT 1
    );

    CREATE VIEW IF NOT EXISTS v_format_comparison AS
    SELECT
        account_name, format,
        COUNT(*)             AS post_count,
        AVG(views)           AS avg_views,
        AVG(likes)           AS avg_likes,
        AVG(saves)           AS avg_saves,
        AVG(engagement_rate) AS avg_engagement_rate
    FROM v_post_performance
    GROUP BY account_name, format;

    CREATE VIEW IF NOT EXISTS v_account_summary AS
    SELECT
        account_name,
        COUNT(*)             AS total_posts,
        AVG(views)           AS avg_views,
        AVG(engagement_rate) AS avg_engagement_rate,
        SUM(views)           AS total_views,
        MAX(views)           AS best_views
    FROM v_post_performance
    GROUP BY account_name;
    "#,
    // Version 3: visual attributes extracted from image prompts
    r#"
    CREATE TABLE IF NOT EXISTS post_visuals (
        id                      INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id                 TEXT NOT NULL UNIQUE REFERENCES posts(post_id),
        photography_style       TEXT,
        lighting                TEXT,
        color_palette           TEXT,
        composition             TEXT,
        scene_setting           TEXT,
        subject_focus           TEXT,
        mood                    TEXT,
        hook_photography_style  TEXT,
        hook_lighting           TEXT,
        hook_color_palette      TEXT,
        hook_composition        TEXT,
        hook_scene_setting      TEXT,
        hook_subject_focus      TEXT,
        hook_mood               TEXT,
        all_attributes_json     TEXT NOT NULL DEFAULT '{}',
        created_at              DATETIME NOT NULL
    );

    CREATE VIEW IF NOT EXISTS v_visual_performance AS
    SELECT
        pp.*,
        pv.photography_style, pv.lighting, pv.color_palette, pv.composition,
        pv.scene_setting, pv.subject_focus, pv.mood,
        pv.hook_photography_style, pv.hook_lighting, pv.hook_color_palette,
        pv.hook_composition, pv.hook_scene_setting, pv.hook_subject_focus,
        pv.hook_mood, pv.all_attributes_json
    FROM v_post_performance pp
    JOIN post_visuals pv ON pp.post_id = pv.post_id;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get current schema version
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
