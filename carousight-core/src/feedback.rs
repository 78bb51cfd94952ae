//! Performance context: the approved-insights file the content generator reads.
//!
//! `performance_context.json` has a fixed set of known keys, but any other
//! keys found in the file are carried through untouched. Approved
//! recommendations are merged in exactly once each, in approval order.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::ProposedChange;
use crate::visuals::VisualAttribute;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

fn default_slide_count() -> i64 {
    5
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookInsights {
    #[serde(default)]
    pub best_styles: Vec<String>,
    #[serde(default)]
    pub worst_styles: Vec<String>,
    #[serde(default)]
    pub reference_hooks: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveVsShare {
    #[serde(default)]
    pub high_save_formats: Vec<String>,
    #[serde(default)]
    pub high_share_formats: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Record of a recommendation already merged into the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRecommendation {
    pub id: i64,
    pub insight: String,
    pub approved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceContext {
    /// `YYYY-MM-DD` of the last merge
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Posts analyzed at the last merge
    #[serde(default)]
    pub sample_size: i64,
    /// Format → generation weight (1.0 is neutral)
    #[serde(default)]
    pub format_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub top_pillars: Vec<String>,
    #[serde(default)]
    pub underperforming_pillars: Vec<String>,
    #[serde(default = "default_slide_count")]
    pub optimal_slide_count: i64,
    #[serde(default)]
    pub hook_insights: HookInsights,
    #[serde(default)]
    pub save_vs_share: SaveVsShare,
    #[serde(default)]
    pub experiment_suggestions: Vec<String>,
    #[serde(default)]
    pub approved_recommendations: Vec<AppliedRecommendation>,
    /// Keys this crate does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PerformanceContext {
    fn default() -> Self {
        Self {
            last_updated: None,
            sample_size: 0,
            format_weights: BTreeMap::new(),
            top_pillars: Vec::new(),
            underperforming_pillars: Vec::new(),
            optimal_slide_count: default_slide_count(),
            hook_insights: HookInsights::default(),
            save_vs_share: SaveVsShare::default(),
            experiment_suggestions: Vec::new(),
            approved_recommendations: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl PerformanceContext {
    /// Generation weight for a format; 1.0 when not set
    pub fn format_weight(&self, format: &str) -> f64 {
        self.format_weights.get(format).copied().unwrap_or(1.0)
    }

    pub fn reference_hooks(&self) -> &[String] {
        &self.hook_insights.reference_hooks
    }

    pub fn top_pillars(&self) -> &[String] {
        &self.top_pillars
    }

    /// Pick one of `available`, each weighted by its format weight.
    ///
    /// Non-positive weights are never picked. If no format has a positive
    /// weight the pick is uniform. `None` only when `available` is empty.
    pub fn choose_format<'f, S, R>(&self, available: &'f [S], rng: &mut R) -> Option<&'f S>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let weights: Vec<f64> = available
            .iter()
            .map(|f| self.format_weight(f.as_ref()).max(0.0))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return available.choose(rng);
        }

        let mut target = rng.random::<f64>() * total;
        for (format, weight) in available.iter().zip(&weights) {
            if *weight > 0.0 && target < *weight {
                return Some(format);
            }
            target -= weight;
        }
        // float rounding can leave target just past the last bucket
        available
            .iter()
            .zip(&weights)
            .rev()
            .find(|(_, w)| **w > 0.0)
            .map(|(f, _)| f)
    }

    /// A random experiment to explore, if any are queued
    pub fn experiment_suggestion<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.experiment_suggestions.choose(rng).map(String::as_str)
    }

    /// Prose hint built from `visual_insights.top_performing`, e.g.
    /// "Data shows best performance with: golden hour lighting, closeup composition".
    pub fn visual_guidance(&self) -> Option<String> {
        let top = self
            .extra
            .get("visual_insights")?
            .get("top_performing")?
            .as_object()?;
        let parts: Vec<String> = top
            .iter()
            .filter_map(|(attr, value)| {
                let value = value.as_str()?.replace('_', " ");
                let label = attr
                    .parse::<VisualAttribute>()
                    .map(|a| a.label())
                    .unwrap_or(attr.as_str());
                Some(format!("{} {}", value, label))
            })
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(format!("Data shows best performance with: {}", parts.join(", ")))
    }

    fn applied_ids(&self) -> HashSet<i64> {
        self.approved_recommendations.iter().map(|r| r.id).collect()
    }
}

/// Load a context file, or `None` when it is missing or unreadable.
pub fn load_performance_context(path: &Path) -> Option<PerformanceContext> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No performance context");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(context) => Some(context),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable performance context");
            None
        }
    }
}

/// Merge a proposed change into the context.
///
/// Per key: object into object merges one level deep, array into array
/// appends the items not already present, anything else replaces the value.
/// If the merged document no longer fits the context schema the context is
/// left unchanged and an error is returned.
pub fn merge_change(context: &mut PerformanceContext, change: &ProposedChange) -> Result<()> {
    let mut doc = match serde_json::to_value(&*context)? {
        Value::Object(map) => map,
        _ => return Err(Error::Config("performance context is not an object".to_string())),
    };

    for (key, value) in change.iter() {
        match (doc.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(patch)) => {
                for (k, v) in patch {
                    existing.insert(k.clone(), v.clone());
                }
            }
            (Some(Value::Array(existing)), Value::Array(items)) => {
                for item in items {
                    if !existing.contains(item) {
                        existing.push(item.clone());
                    }
                }
            }
            _ => {
                doc.insert(key.clone(), value.clone());
            }
        }
    }

    let merged: PerformanceContext = serde_json::from_value(Value::Object(doc))
        .map_err(|e| Error::Config(format!("change does not fit performance context: {e}")))?;
    *context = merged;
    Ok(())
}

/// What [`apply_approved`] did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyOutcome {
    pub path: PathBuf,
    /// Recommendation ids merged in this pass
    pub applied: Vec<i64>,
    /// Recommendation ids whose change was rejected (retried next pass)
    pub failed: Vec<i64>,
}

/// Merge every approved, not yet applied recommendation into the context
/// file at `path`, then stamp the date and sample size and write it back.
///
/// A missing file starts from the default context. Existing unrelated keys
/// are preserved. Running it twice applies nothing the second time.
pub fn apply_approved(db: &Database, account: &str, path: &Path) -> Result<ApplyOutcome> {
    let mut context = if path.exists() {
        serde_json::from_str(&std::fs::read_to_string(path)?)?
    } else {
        PerformanceContext::default()
    };

    let already_applied = context.applied_ids();
    let mut outcome = ApplyOutcome {
        path: path.to_path_buf(),
        ..Default::default()
    };

    for rec in db.get_approved_recommendations(account)? {
        if already_applied.contains(&rec.id) {
            continue;
        }
        match merge_change(&mut context, &rec.proposed_change) {
            Ok(()) => {
                context.approved_recommendations.push(AppliedRecommendation {
                    id: rec.id,
                    insight: rec.insight.clone(),
                    approved_at: rec.approved_at.map(crate::db::repo::format_ts),
                });
                outcome.applied.push(rec.id);
            }
            Err(e) => {
                tracing::error!(
                    account,
                    recommendation_id = rec.id,
                    error = %e,
                    "Failed to apply recommendation"
                );
                outcome.failed.push(rec.id);
            }
        }
    }

    context.last_updated = Some(chrono::Local::now().format("%Y-%m-%d").to_string());
    context.sample_size = db
        .account_summary(account)?
        .map(|s| s.total_posts)
        .unwrap_or(0);

    write_context(path, &context)?;
    tracing::info!(
        account,
        path = %path.display(),
        applied = outcome.applied.len(),
        failed = outcome.failed.len(),
        "Updated performance context"
    );
    Ok(outcome)
}

/// Write through a sibling temp file so readers never see a partial file.
fn write_context(path: &Path, context: &PerformanceContext) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(context)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Confidence, EngagementCounts, Platform, PostUpsert, RecommendationCategory,
        RecommendationDraft, RecommendationStatus,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use tempfile::TempDir;

    fn change(value: Value) -> ProposedChange {
        ProposedChange::try_from(value).unwrap()
    }

    fn approve(db: &Database, patch: Value) -> i64 {
        let id = db
            .create_recommendation(
                "acct",
                &RecommendationDraft {
                    category: RecommendationCategory::FormatWeight,
                    insight: "Listicles outperform".to_string(),
                    proposed_change: change(patch),
                    confidence: Confidence::High,
                },
            )
            .unwrap();
        db.update_recommendation_status(id, RecommendationStatus::Approved)
            .unwrap();
        id
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.upsert_post(&PostUpsert::new("acct", Platform::TikTok, "tt_1"))
            .unwrap();
        db.insert_snapshot("tt_1", &EngagementCounts::default())
            .unwrap();
        db
    }

    #[test]
    fn test_default_context_shape() {
        let value = serde_json::to_value(PerformanceContext::default()).unwrap();
        assert_eq!(value["optimal_slide_count"], 5);
        assert_eq!(value["last_updated"], Value::Null);
        assert_eq!(value["hook_insights"]["reference_hooks"], json!([]));
        assert_eq!(value["save_vs_share"]["high_save_formats"], json!([]));
        assert_eq!(value["approved_recommendations"], json!([]));
    }

    #[test]
    fn test_merge_rules() {
        let mut context = PerformanceContext::default();
        context.format_weights.insert("story".to_string(), 0.8);
        context.top_pillars = vec!["sleep".to_string()];

        merge_change(
            &mut context,
            &change(json!({
                "format_weights": {"listicle": 1.5},
                "top_pillars": ["sleep", "feeding"],
                "optimal_slide_count": 7,
                "hook_insights": {"best_styles": ["question"]},
                "posting_cadence": "daily"
            })),
        )
        .unwrap();

        assert_eq!(context.format_weight("story"), 0.8);
        assert_eq!(context.format_weight("listicle"), 1.5);
        assert_eq!(context.format_weight("never-seen"), 1.0);
        assert_eq!(context.top_pillars(), ["sleep", "feeding"]);
        assert_eq!(context.optimal_slide_count, 7);
        // one-level merge replaces the nested list wholesale
        assert_eq!(context.hook_insights.best_styles, vec!["question"]);
        assert_eq!(context.extra["posting_cadence"], json!("daily"));
    }

    #[test]
    fn test_merge_rejects_schema_violation() {
        let mut context = PerformanceContext::default();
        let before = context.clone();
        let err = merge_change(&mut context, &change(json!({"optimal_slide_count": "lots"})));
        assert!(err.is_err());
        assert_eq!(context, before);
    }

    #[test]
    fn test_apply_approved_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("acct").join("performance_context.json");
        let db = test_db();
        let id = approve(&db, json!({"format_weights": {"listicle": 1.5}}));

        let first = apply_approved(&db, "acct", &path).unwrap();
        assert_eq!(first.applied, vec![id]);

        let second = apply_approved(&db, "acct", &path).unwrap();
        assert!(second.applied.is_empty());

        let context = load_performance_context(&path).unwrap();
        assert_eq!(context.approved_recommendations.len(), 1);
        assert_eq!(context.approved_recommendations[0].id, id);
        assert!(context.approved_recommendations[0].approved_at.is_some());
        assert_eq!(context.format_weight("listicle"), 1.5);
        assert_eq!(context.sample_size, 1);
        assert_eq!(
            context.last_updated.as_deref(),
            Some(chrono::Local::now().format("%Y-%m-%d").to_string().as_str())
        );
    }

    #[test]
    fn test_apply_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("performance_context.json");
        std::fs::write(
            &path,
            json!({
                "custom_notes": {"owner": "ops"},
                "format_weights": {"story": 0.9},
                "hook_insights": {"reference_hooks": ["Why won't my baby sleep?"], "tone": "warm"}
            })
            .to_string(),
        )
        .unwrap();

        let db = test_db();
        approve(&db, json!({"hook_insights": {"best_styles": ["question"]}}));
        apply_approved(&db, "acct", &path).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["custom_notes"], json!({"owner": "ops"}));
        assert_eq!(raw["format_weights"]["story"], json!(0.9));
        assert_eq!(raw["hook_insights"]["tone"], json!("warm"));
        assert_eq!(raw["hook_insights"]["best_styles"], json!(["question"]));
        assert_eq!(
            raw["hook_insights"]["reference_hooks"],
            json!(["Why won't my baby sleep?"])
        );
    }

    #[test]
    fn test_bad_change_is_skipped_not_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("performance_context.json");
        let db = test_db();
        let bad = approve(&db, json!({"top_pillars": "sleep"}));
        let good = approve(&db, json!({"underperforming_pillars": ["feeding"]}));

        let outcome = apply_approved(&db, "acct", &path).unwrap();
        assert_eq!(outcome.failed, vec![bad]);
        assert_eq!(outcome.applied, vec![good]);

        let context = load_performance_context(&path).unwrap();
        assert_eq!(context.underperforming_pillars, vec!["feeding"]);
        assert!(context.top_pillars.is_empty());
    }

    #[test]
    fn test_choose_format_follows_weights() {
        let mut context = PerformanceContext::default();
        context.format_weights.insert("listicle".to_string(), 3.0);
        context.format_weights.insert("story".to_string(), 0.0);
        let formats = ["story", "listicle", "myth_buster"];
        let mut rng = StdRng::seed_from_u64(7);

        let mut listicles = 0;
        for _ in 0..400 {
            let pick = *context.choose_format(&formats, &mut rng).unwrap();
            assert_ne!(pick, "story");
            if pick == "listicle" {
                listicles += 1;
            }
        }
        // expected share is 3/4
        assert!((240..=360).contains(&listicles), "got {listicles}");

        let empty: [&str; 0] = [];
        assert!(context.choose_format(&empty, &mut rng).is_none());
    }

    #[test]
    fn test_choose_format_all_zero_is_uniform() {
        let mut context = PerformanceContext::default();
        context.format_weights.insert("story".to_string(), 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let only = ["story".to_string()];
        assert_eq!(context.choose_format(&only, &mut rng).map(String::as_str), Some("story"));
    }

    #[test]
    fn test_experiment_suggestion() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut context = PerformanceContext::default();
        assert!(context.experiment_suggestion(&mut rng).is_none());

        context.experiment_suggestions = vec!["7-slide myth busters".to_string()];
        assert_eq!(
            context.experiment_suggestion(&mut rng),
            Some("7-slide myth busters")
        );
    }

    #[test]
    fn test_visual_guidance_from_merged_insights() {
        let mut context = PerformanceContext::default();
        assert!(context.visual_guidance().is_none());

        merge_change(
            &mut context,
            &change(json!({"visual_insights": {"top_performing": {
                "lighting": "golden_hour",
                "scene_setting": "bedroom"
            }}})),
        )
        .unwrap();
        assert_eq!(
            context.visual_guidance().as_deref(),
            Some("Data shows best performance with: golden hour lighting, bedroom setting")
        );
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = TempDir::new().unwrap();
        assert!(load_performance_context(&dir.path().join("none.json")).is_none());
        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{").unwrap();
        assert!(load_performance_context(&corrupt).is_none());
    }
}
