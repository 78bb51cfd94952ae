//! Normalization of provider dataset items into [`ScrapedPost`]s.
//!
//! Item shapes differ per platform and per actor version; everything here is
//! tolerant of missing fields and of counters encoded as strings.

use super::ScrapedPost;
use crate::types::{EngagementCounts, Platform};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Normalize one dataset item. Items without an id are dropped.
pub fn normalize_item(platform: Platform, item: &Value) -> Option<ScrapedPost> {
    match platform {
        Platform::TikTok => normalize_tiktok(item),
        Platform::Instagram => normalize_instagram(item),
    }
}

pub fn normalize_tiktok(item: &Value) -> Option<ScrapedPost> {
    let post_id = id_of(item)?;
    let stats = item.get("statsV2");
    let counter = |key: &str| {
        nonzero(item.get(key))
            .or_else(|| stats.and_then(|s| as_count(s.get(key))))
            .unwrap_or(0)
    };

    let published_at = item
        .get("createTimeISO")
        .and_then(Value::as_str)
        .and_then(parse_time)
        .or_else(|| {
            as_count(item.get("createTime")).and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        });

    Some(ScrapedPost {
        post_id,
        url: string_of(item, "webVideoUrl"),
        caption: string_of(item, "text").unwrap_or_default(),
        published_at,
        counts: EngagementCounts {
            views: counter("playCount"),
            likes: counter("diggCount"),
            comments: counter("commentCount"),
            shares: counter("shareCount"),
            saves: counter("collectCount"),
        },
    })
}

/// Instagram does not expose shares or saves; both are always 0.
pub fn normalize_instagram(item: &Value) -> Option<ScrapedPost> {
    let post_id = id_of(item)?;
    let views = nonzero(item.get("videoViewCount"))
        .or_else(|| as_count(item.get("playCount")))
        .unwrap_or(0);

    Some(ScrapedPost {
        post_id,
        url: string_of(item, "url"),
        caption: string_of(item, "caption").unwrap_or_default(),
        published_at: item
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_time),
        counts: EngagementCounts {
            views,
            likes: as_count(item.get("likesCount")).unwrap_or(0),
            comments: as_count(item.get("commentsCount")).unwrap_or(0),
            shares: 0,
            saves: 0,
        },
    })
}

fn id_of(item: &Value) -> Option<String> {
    let id = match item.get("id")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn string_of(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// A counter as i64, from a number or a numeric string.
fn as_count(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u.min(i64::MAX as u64) as i64))
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// A zero counter at top level is treated as absent, so nested stats win.
fn nonzero(value: Option<&Value>) -> Option<i64> {
    as_count(value).filter(|n| *n != 0)
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
