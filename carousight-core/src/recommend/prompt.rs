//! Recommendation prompt and response parsing.

use crate::analytics::AccountReport;
use crate::types::{Confidence, ProposedChange, RecommendationCategory, RecommendationDraft};
use crate::Result;
use serde_json::Value;

const PROMPT_HEADER: &str = "You are a social media content strategist reviewing carousel performance. \
Study the analysis below and propose concrete, actionable changes to the account's content strategy.";

const FRAMEWORKS: &str = r#"## Lenses to apply
- Pareto (80/20): which few formats or topics produce most of the views?
- Survivorship bias: what keeps failing and should be dropped?
- Exploration vs exploitation: is one format over-used, and what is worth testing?
- Local vs global optima: is the account optimizing the wrong metric?
- Content pillar rebalancing: which pillars deserve more or less output?
- Save vs share: saves and shares reward different kinds of content.
- Visual style: which lighting, composition, setting or mood goes with the best posts?"#;

const OUTPUT_CONTRACT: &str = r#"## Output
Respond with a JSON array of 3 to 5 objects shaped like:
[
  {
    "category": "format_weight|hook_style|topic_priority|pillar_rebalance|format_experiment|failure_pattern|80_20_insight|save_vs_share|slide_count|cta_strategy",
    "insight": "plain-language finding that cites numbers from the data",
    "proposed_change": { "key": "value patch for performance_context.json" },
    "confidence": "high|medium|low"
  }
]

Rules:
- Every insight must quote specific numbers from the data.
- proposed_change must be a JSON object that patches performance_context.json.
- Only recommend changes backed by at least 5 posts.
- Include at least one experiment to try.
- Include at least one analysis of what is failing.

Respond with the JSON array only."#;

/// Build the prompt for one account's report.
pub fn build_prompt(report: &AccountReport) -> Result<String> {
    let report_json = serde_json::to_string_pretty(report)?;
    Ok(format!(
        "{PROMPT_HEADER}\n\n## Analysis data for {}\n{}\n\n{FRAMEWORKS}\n\n{OUTPUT_CONTRACT}",
        report.account, report_json
    ))
}

/// Drafts recovered from a model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecommendations {
    pub drafts: Vec<RecommendationDraft>,
    /// Array elements that failed validation
    pub skipped: usize,
    /// No JSON array could be recovered at all
    pub malformed: bool,
}

/// Parse a model response into validated drafts.
///
/// The whole response is tried as JSON first, then the outermost `[...]`
/// span. If neither yields an array the result is empty and flagged
/// `malformed`. Invalid elements are skipped and counted.
pub fn parse_recommendations(raw: &str) -> ParsedRecommendations {
    let items = match extract_array(raw) {
        Some(items) => items,
        None => {
            return ParsedRecommendations {
                malformed: true,
                ..Default::default()
            }
        }
    };

    let mut parsed = ParsedRecommendations::default();
    for (index, item) in items.into_iter().enumerate() {
        match validate_item(item) {
            Ok(draft) => parsed.drafts.push(draft),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "Skipping invalid recommendation");
                parsed.skipped += 1;
            }
        }
    }
    parsed
}

fn extract_array(raw: &str) -> Option<Vec<Value>> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(items);
    }
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn validate_item(item: Value) -> std::result::Result<RecommendationDraft, String> {
    let Value::Object(mut obj) = item else {
        return Err("element is not an object".to_string());
    };

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .ok_or("missing category")?
        .parse::<RecommendationCategory>()?;

    let insight = obj
        .get("insight")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing insight")?
        .to_string();

    let change = obj
        .remove("proposed_change")
        .ok_or("missing proposed_change")?;
    let proposed_change = ProposedChange::try_from(change)?;

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => Confidence::default(),
        Some(Value::String(s)) => s.to_lowercase().parse::<Confidence>()?,
        Some(other) => return Err(format!("confidence must be a string, got {}", other)),
    };

    Ok(RecommendationDraft {
        category,
        insight,
        proposed_change,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::ParetoAnalysis;

    fn empty_report() -> AccountReport {
        AccountReport {
            account: "dreamtimelullabies".to_string(),
            summary: None,
            formats: vec![],
            pillars: vec![],
            top_posts: vec![],
            bottom_posts: vec![],
            pareto: ParetoAnalysis::default(),
            hook_correlation: vec![],
            slide_counts: vec![],
            visuals: Default::default(),
        }
    }

    #[test]
    fn test_prompt_embeds_report_and_contract() {
        let prompt = build_prompt(&empty_report()).unwrap();
        assert!(prompt.contains("\"account\": \"dreamtimelullabies\""));
        assert!(prompt.contains("Pareto (80/20)"));
        assert!(prompt.contains("Survivorship bias"));
        assert!(prompt.contains("80_20_insight"));
        assert!(prompt.contains("at least 5 posts"));
    }

    #[test]
    fn test_parse_plain_array() {
        let raw = r#"[
            {"category": "format_weight", "insight": "Listicles average 12,400 views",
             "proposed_change": {"format_weights": {"listicle": 1.5}}, "confidence": "high"},
            {"category": "80_20_insight", "insight": "2 formats drive 85% of views",
             "proposed_change": {"top_pillars": ["sleep"]}}
        ]"#;
        let parsed = parse_recommendations(raw);
        assert!(!parsed.malformed);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.drafts.len(), 2);
        assert_eq!(parsed.drafts[0].confidence, Confidence::High);
        assert_eq!(parsed.drafts[1].category, RecommendationCategory::ParetoInsight);
        assert_eq!(parsed.drafts[1].confidence, Confidence::Medium);
    }

    #[test]
    fn test_parse_fenced_response() {
        let raw = "Here you go:\n```json\n[{\"category\": \"hook_style\", \"insight\": \"Questions win by 30%\", \"proposed_change\": {}}]\n```";
        let parsed = parse_recommendations(raw);
        assert_eq!(parsed.drafts.len(), 1);
        assert!(parsed.drafts[0].proposed_change.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let parsed = parse_recommendations("I cannot help with that.");
        assert!(parsed.malformed);
        assert!(parsed.drafts.is_empty());

        let parsed = parse_recommendations("] nope [");
        assert!(parsed.malformed);
    }

    #[test]
    fn test_invalid_items_skipped() {
        let raw = r#"[
            {"category": "vibes", "insight": "x", "proposed_change": {}},
            {"category": "slide_count", "proposed_change": {}},
            {"category": "slide_count", "insight": "7 slides win", "proposed_change": "use 7"},
            {"category": "slide_count", "insight": "7 slides win", "proposed_change": {"optimal_slide_count": 7}, "confidence": "certain"},
            "not an object",
            {"category": "slide_count", "insight": "7 slides win", "proposed_change": {"optimal_slide_count": 7}, "confidence": "LOW"}
        ]"#;
        let parsed = parse_recommendations(raw);
        assert!(!parsed.malformed);
        assert_eq!(parsed.skipped, 5);
        assert_eq!(parsed.drafts.len(), 1);
        assert_eq!(parsed.drafts[0].confidence, Confidence::Low);
    }
}
