//! Formatting helpers shared by the CLI report and the dashboard.

use chrono::{DateTime, Utc};

/// Format a timestamp as relative time (e.g., "2d ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Format an optional timestamp as relative time, or "-" if missing.
pub fn format_relative_time_opt(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts),
        None => "-".to_string(),
    }
}

/// Format a count compactly: 950, 12.3K, 4.1M.
pub fn format_count(n: f64) -> String {
    let abs = n.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else {
        format!("{:.0}", n)
    }
}

/// Format a ratio as a percentage with two decimals (0.0781 -> "7.81%").
pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Truncate to at most `max` characters, appending "..." when cut.
///
/// Counts chars, not bytes, so multi-byte text is never split.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(950.0), "950");
        assert_eq!(format_count(12_345.0), "12.3K");
        assert_eq!(format_count(4_100_000.0), "4.1M");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.078), "7.80%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_chars("ééééé", 4), "é...");
    }

    #[test]
    fn test_relative_time() {
        assert_eq!(format_relative_time(Utc::now() - Duration::hours(3)), "3h ago");
        assert_eq!(format_relative_time_opt(None), "-");
    }
}
