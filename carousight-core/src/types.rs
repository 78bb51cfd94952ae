//! Core domain types for carousight
//!
//! These types represent the stored data model: published carousel posts,
//! append-only metric snapshots, and the recommendation queue that feeds the
//! performance context.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Account** | A named content brand, published on one or more platforms |
//! | **Post** | One published carousel, keyed by the platform's post id |
//! | **Snapshot** | Point-in-time engagement counters for a post |
//! | **Format** | The generator's structural template for a carousel |
//! | **Pillar** | A broad content theme an account rotates through |
//! | **Hook** | The first slide's text |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Platform
// ============================================

/// Social platform a post was published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    TikTok,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::TikTok),
            "instagram" => Ok(Platform::Instagram),
            _ => Err(format!("unknown platform: {}", s)),
        }
    }
}

// ============================================
// Posts
// ============================================

/// A published carousel post.
///
/// `post_id` is the platform's identifier and the join key for snapshots.
/// Generation metadata (topic, format, hook score, slide count) is filled in
/// later by the backfill matcher and may stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Row id
    pub id: i64,
    /// Owning account name
    pub account: String,
    /// Platform this post lives on
    pub platform: Platform,
    /// Platform post id (unique)
    pub post_id: String,
    /// Canonical post URL
    pub url: Option<String>,
    pub topic: Option<String>,
    pub format: Option<String>,
    pub hook_text: Option<String>,
    pub hook_score: Option<f64>,
    pub slide_count: Option<i64>,
    pub content_pillar: Option<String>,
    /// When the platform says it was published
    pub published_at: Option<DateTime<Utc>>,
    /// When we first stored it
    pub created_at: DateTime<Utc>,
}

/// Write-side shape of a post.
///
/// On update, every `None` field leaves the stored value untouched. The
/// account and platform are only used when the post is first inserted.
#[derive(Debug, Clone)]
pub struct PostUpsert {
    pub account: String,
    pub platform: Platform,
    pub post_id: String,
    pub url: Option<String>,
    pub topic: Option<String>,
    pub format: Option<String>,
    pub hook_text: Option<String>,
    pub hook_score: Option<f64>,
    pub slide_count: Option<i64>,
    pub content_pillar: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl PostUpsert {
    /// Start an upsert for a post id with nothing but its identity set.
    pub fn new(account: impl Into<String>, platform: Platform, post_id: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            platform,
            post_id: post_id.into(),
            url: None,
            topic: None,
            format: None,
            hook_text: None,
            hook_score: None,
            slide_count: None,
            content_pillar: None,
            published_at: None,
        }
    }
}

// ============================================
// Metrics
// ============================================

/// Raw engagement counters as reported by a platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub saves: i64,
}

impl EngagementCounts {
    /// Interactions (likes + comments + shares + saves)
    pub fn interactions(&self) -> i64 {
        self.likes + self.comments + self.shares + self.saves
    }

    /// Interactions per view. Exactly 0.0 when there are no views.
    pub fn engagement_rate(&self) -> f64 {
        if self.views > 0 {
            self.interactions() as f64 / self.views as f64
        } else {
            0.0
        }
    }
}

/// One append-only measurement of a post's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub id: i64,
    pub post_id: String,
    pub scraped_at: DateTime<Utc>,
    #[serde(flatten)]
    pub counts: EngagementCounts,
    /// Engagement rate computed when the snapshot was written
    pub engagement_rate: f64,
}

// ============================================
// Recommendations
// ============================================

/// What aspect of content strategy a recommendation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    FormatWeight,
    HookStyle,
    TopicPriority,
    PillarRebalance,
    FormatExperiment,
    FailurePattern,
    #[serde(rename = "80_20_insight")]
    ParetoInsight,
    SaveVsShare,
    SlideCount,
    CtaStrategy,
}

impl RecommendationCategory {
    pub const ALL: [RecommendationCategory; 10] = [
        RecommendationCategory::FormatWeight,
        RecommendationCategory::HookStyle,
        RecommendationCategory::TopicPriority,
        RecommendationCategory::PillarRebalance,
        RecommendationCategory::FormatExperiment,
        RecommendationCategory::FailurePattern,
        RecommendationCategory::ParetoInsight,
        RecommendationCategory::SaveVsShare,
        RecommendationCategory::SlideCount,
        RecommendationCategory::CtaStrategy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationCategory::FormatWeight => "format_weight",
            RecommendationCategory::HookStyle => "hook_style",
            RecommendationCategory::TopicPriority => "topic_priority",
            RecommendationCategory::PillarRebalance => "pillar_rebalance",
            RecommendationCategory::FormatExperiment => "format_experiment",
            RecommendationCategory::FailurePattern => "failure_pattern",
            RecommendationCategory::ParetoInsight => "80_20_insight",
            RecommendationCategory::SaveVsShare => "save_vs_share",
            RecommendationCategory::SlideCount => "slide_count",
            RecommendationCategory::CtaStrategy => "cta_strategy",
        }
    }
}

impl std::fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecommendationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown recommendation category: {}", s))
    }
}

/// Model-reported confidence in a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            _ => Err(format!("unknown confidence: {}", s)),
        }
    }
}

/// Review state of a recommendation.
///
/// Only `Pending → Approved` and `Pending → Rejected` are legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Approved => "approved",
            RecommendationStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecommendationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecommendationStatus::Pending),
            "approved" => Ok(RecommendationStatus::Approved),
            "rejected" => Ok(RecommendationStatus::Rejected),
            _ => Err(format!("unknown recommendation status: {}", s)),
        }
    }
}

/// A key-value patch for the performance context.
///
/// Always a JSON object; anything else is rejected when constructed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposedChange(pub serde_json::Map<String, serde_json::Value>);

impl ProposedChange {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl TryFrom<serde_json::Value> for ProposedChange {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(ProposedChange(map)),
            other => Err(format!(
                "proposed_change must be an object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

impl std::fmt::Display for ProposedChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A validated recommendation that has not been stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDraft {
    pub category: RecommendationCategory,
    pub insight: String,
    pub proposed_change: ProposedChange,
    #[serde(default)]
    pub confidence: Confidence,
}

/// A stored recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub account: String,
    pub category: RecommendationCategory,
    pub insight: String,
    pub proposed_change: ProposedChange,
    pub confidence: Confidence,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    /// Set when approved, cleared when rejected
    pub approved_at: Option<DateTime<Utc>>,
}
