//! 80/20 ranking of formats and pillars.
//!
//! A group's contribution is `avg_views × post_count`, i.e. the total views
//! it produced. Groups are ranked by contribution, and each entry carries its
//! share of the total and the running cumulative share so the "vital few"
//! can be read off directly.

use crate::db::GroupStats;
use serde::Serialize;

/// Cumulative share that marks the end of the vital few
pub const VITAL_FEW_SHARE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParetoEntry {
    pub name: String,
    pub post_count: i64,
    pub avg_views: f64,
    pub avg_saves: f64,
    pub avg_engagement_rate: f64,
    /// avg_views × post_count
    pub contribution: f64,
    /// contribution / sum of contributions (0 when the sum is 0)
    pub share_of_total: f64,
    /// Running sum of `share_of_total` down to and including this entry
    pub cumulative_share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParetoAnalysis {
    pub top_formats: Vec<ParetoEntry>,
    pub top_pillars: Vec<ParetoEntry>,
}

impl ParetoAnalysis {
    pub fn new(formats: &[GroupStats], pillars: &[GroupStats]) -> Self {
        Self {
            top_formats: rank(formats),
            top_pillars: rank(pillars),
        }
    }

    /// One-line summary of the best format, e.g. for the report footer.
    pub fn insight(&self) -> Option<String> {
        let top = self.top_formats.first()?;
        let vital = vital_few(&self.top_formats);
        Some(format!(
            "{} is your top format with {:.0} avg views across {} posts; {} of {} formats produce {:.0}% of views",
            top.name,
            top.avg_views,
            top.post_count,
            vital.len(),
            self.top_formats.len(),
            vital.last().map(|e| e.cumulative_share * 100.0).unwrap_or(0.0),
        ))
    }
}

/// Rank groups by contribution, highest first.
///
/// The sort is stable, so groups with equal contribution keep their input
/// order.
pub fn rank(groups: &[GroupStats]) -> Vec<ParetoEntry> {
    let mut entries: Vec<ParetoEntry> = groups
        .iter()
        .map(|g| ParetoEntry {
            name: g.name.clone(),
            post_count: g.post_count,
            avg_views: g.avg_views,
            avg_saves: g.avg_saves,
            avg_engagement_rate: g.avg_engagement_rate,
            contribution: g.avg_views * g.post_count as f64,
            share_of_total: 0.0,
            cumulative_share: 0.0,
        })
        .collect();

    entries.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

    let total: f64 = entries.iter().map(|e| e.contribution).sum();
    let mut running = 0.0;
    for entry in &mut entries {
        entry.share_of_total = if total > 0.0 {
            entry.contribution / total
        } else {
            0.0
        };
        running += entry.share_of_total;
        entry.cumulative_share = running;
    }
    entries
}

/// The shortest prefix of a ranking whose cumulative share reaches 80%.
pub fn vital_few(entries: &[ParetoEntry]) -> &[ParetoEntry] {
    match entries
        .iter()
        .position(|e| e.cumulative_share >= VITAL_FEW_SHARE)
    {
        Some(i) => &entries[..=i],
        None => entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, post_count: i64, avg_views: f64) -> GroupStats {
        GroupStats {
            name: name.to_string(),
            post_count,
            avg_views,
            avg_likes: 0.0,
            avg_saves: 0.0,
            avg_engagement_rate: 0.0,
        }
    }

    #[test]
    fn test_rank_by_contribution_not_average() {
        // B has the higher average but A produced more total views
        let ranked = rank(&[group("A", 10, 1000.0), group("B", 1, 5000.0)]);
        assert_eq!(ranked[0].name, "A");
        assert_eq!(ranked[0].contribution, 10000.0);
        assert_eq!(ranked[1].name, "B");
    }

    #[test]
    fn test_shares_sum_to_one() {
        let ranked = rank(&[
            group("a", 2, 100.0),
            group("b", 1, 600.0),
            group("c", 4, 50.0),
        ]);
        assert_eq!(ranked[0].name, "b");
        assert!((ranked[0].share_of_total - 0.6).abs() < 1e-9);
        assert!((ranked.last().unwrap().cumulative_share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank(&[group("x", 1, 100.0), group("y", 2, 50.0), group("z", 4, 25.0)]);
        let names: Vec<&str> = ranked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_zero_views() {
        let ranked = rank(&[group("a", 3, 0.0)]);
        assert_eq!(ranked[0].share_of_total, 0.0);
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn test_vital_few() {
        let ranked = rank(&[
            group("big", 1, 850.0),
            group("small", 1, 100.0),
            group("tiny", 1, 50.0),
        ]);
        assert_eq!(vital_few(&ranked).len(), 1);

        let analysis = ParetoAnalysis {
            top_formats: ranked,
            top_pillars: Vec::new(),
        };
        let insight = analysis.insight().unwrap();
        assert!(insight.starts_with("big is your top format"));
        assert!(insight.contains("1 of 3 formats produce 85% of views"));
    }
}
