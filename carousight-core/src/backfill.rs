//! Backfill of generation metadata onto scraped posts.
//!
//! The content generator leaves a `meta.json` descriptor (topic, format,
//! hook score, item count) next to a `carousel_data.json` whose first slide
//! holds the hook text. Platforms return only the caption, so posts are
//! joined to descriptors by word-set similarity between the post's hook text
//! and the first slide. When the carousel data carries per-slide image
//! prompts, a matched post also gets a visual profile (see [`crate::visuals`]).
//!
//! Matching is heuristic. [`evaluate_matcher`] measures precision and recall
//! of a threshold over hand-labelled pairs.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Post, PostUpsert};
use crate::visuals;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Words ignored when comparing hook texts
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "to", "and", "of", "in", "for", "that", "this", "my", "your",
];

pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// A generated carousel found on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDescriptor {
    /// Path of the `meta.json`
    pub path: PathBuf,
    pub topic: Option<String>,
    pub format: Option<String>,
    pub hook_score: Option<f64>,
    pub num_items: Option<i64>,
    /// First slide text, empty when `carousel_data.json` is missing
    pub hook_text: String,
    /// One image prompt per slide, in slide order
    pub image_prompts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MetaFile {
    topic: Option<String>,
    format: Option<String>,
    hook_score: Option<f64>,
    num_items: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CarouselFile {
    #[serde(default)]
    slides: Vec<Slide>,
    #[serde(default)]
    image_prompts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Slide {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillMatch {
    pub post_id: String,
    pub descriptor: PathBuf,
    pub score: f64,
}

/// What one backfill pass did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackfillReport {
    /// Posts that lacked a format going in
    pub candidates: usize,
    pub matches: Vec<BackfillMatch>,
    pub unmatched: Vec<String>,
    /// Descriptors that could not be read
    pub skipped_descriptors: usize,
    /// Posts that received a visual profile in this pass
    pub visuals_extracted: usize,
}

/// Lower-cased words minus stopwords
fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .map(ToString::to_string)
        .collect()
}

/// Intersection over union of the two word sets. 0.0 if either is empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let words_a = word_set(a);
    let words_b = word_set(b);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Best descriptor for a hook, if any reaches `threshold`.
///
/// Only a strictly higher score replaces the current best, so the first of
/// several equal candidates wins.
pub fn find_match<'d>(
    hook: &str,
    descriptors: &'d [ContentDescriptor],
    threshold: f64,
) -> Option<(&'d ContentDescriptor, f64)> {
    if hook.trim().is_empty() {
        return None;
    }
    let mut best: Option<(&ContentDescriptor, f64)> = None;
    for descriptor in descriptors {
        if descriptor.hook_text.trim().is_empty() {
            continue;
        }
        let score = jaccard_similarity(hook, &descriptor.hook_text);
        let best_score = best.map(|(_, s)| s).unwrap_or(0.0);
        if score > best_score && score >= threshold {
            best = Some((descriptor, score));
        }
    }
    best
}

/// Scan `root` for `**/meta.json` descriptors.
///
/// Unreadable descriptors are logged and counted, never fatal. Returns the
/// descriptors in path order and the number skipped.
pub fn index_generated_content(root: &Path) -> Result<(Vec<ContentDescriptor>, usize)> {
    let pattern = format!(
        "{}/**/meta.json",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| Error::Config(format!("invalid output directory {:?}: {}", root, e)))?;

    let mut found: Vec<PathBuf> = Vec::new();
    let mut skipped = 0;
    for entry in paths {
        match entry {
            Ok(path) => found.push(path),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable path during content scan");
                skipped += 1;
            }
        }
    }
    found.sort();

    let mut descriptors = Vec::with_capacity(found.len());
    for path in found {
        match read_descriptor(&path) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping malformed descriptor");
                skipped += 1;
            }
        }
    }

    tracing::debug!(root = %root.display(), found = descriptors.len(), skipped, "Indexed generated content");
    Ok((descriptors, skipped))
}

fn read_descriptor(meta_path: &Path) -> Result<ContentDescriptor> {
    let meta: MetaFile = serde_json::from_str(&std::fs::read_to_string(meta_path)?)?;

    let carousel_path = meta_path.with_file_name("carousel_data.json");
    let carousel: CarouselFile = if carousel_path.exists() {
        serde_json::from_str(&std::fs::read_to_string(&carousel_path)?)?
    } else {
        CarouselFile {
            slides: Vec::new(),
            image_prompts: Vec::new(),
        }
    };
    let hook_text = carousel
        .slides
        .into_iter()
        .next()
        .map(|s| s.text)
        .unwrap_or_default();

    Ok(ContentDescriptor {
        path: meta_path.to_path_buf(),
        topic: meta.topic,
        format: meta.format,
        hook_score: meta.hook_score,
        num_items: meta.num_items,
        hook_text,
        image_prompts: carousel.image_prompts,
    })
}

pub struct BackfillMatcher<'a> {
    db: &'a Database,
    threshold: f64,
}

impl<'a> BackfillMatcher<'a> {
    pub fn new(db: &'a Database, threshold: f64) -> Self {
        Self { db, threshold }
    }

    /// Attach generation metadata to every post of `account` that lacks a
    /// format, using descriptors found under `output_root`.
    ///
    /// Matched posts, including ones matched on an earlier pass, also get a
    /// visual profile when their descriptor has image prompts.
    pub fn backfill_account(&self, account: &str, output_root: &Path) -> Result<BackfillReport> {
        let unmatched = self.db.get_unmatched_posts(account)?;
        let missing_visuals = self.db.get_posts_missing_visuals(account)?;
        let mut report = BackfillReport {
            candidates: unmatched.len(),
            ..Default::default()
        };
        if unmatched.is_empty() && missing_visuals.is_empty() {
            return Ok(report);
        }

        let (descriptors, skipped) = index_generated_content(output_root)?;
        report.skipped_descriptors = skipped;

        for post in unmatched {
            let hook = post.hook_text.as_deref().unwrap_or_default();
            match find_match(hook, &descriptors, self.threshold) {
                Some((descriptor, score)) => {
                    let mut patch = PostUpsert::new(&post.account, post.platform, &post.post_id);
                    patch.topic = descriptor.topic.clone();
                    patch.format = descriptor.format.clone();
                    patch.hook_score = descriptor.hook_score;
                    patch.slide_count = descriptor.num_items;
                    self.db.upsert_post(&patch)?;

                    tracing::info!(
                        account,
                        post_id = %post.post_id,
                        topic = descriptor.topic.as_deref().unwrap_or(""),
                        score,
                        "Matched post to generated content"
                    );
                    if self.store_visuals(&post, descriptor)? {
                        report.visuals_extracted += 1;
                    }
                    report.matches.push(BackfillMatch {
                        post_id: post.post_id,
                        descriptor: descriptor.path.clone(),
                        score,
                    });
                }
                None => report.unmatched.push(post.post_id),
            }
        }

        for post in missing_visuals {
            let hook = post.hook_text.as_deref().unwrap_or_default();
            if let Some((descriptor, _)) = find_match(hook, &descriptors, self.threshold) {
                if self.store_visuals(&post, descriptor)? {
                    report.visuals_extracted += 1;
                }
            }
        }

        tracing::info!(
            account,
            matched = report.matches.len(),
            candidates = report.candidates,
            visuals = report.visuals_extracted,
            "Backfill complete"
        );
        Ok(report)
    }

    /// Returns false when the descriptor has no prompts or nothing classified.
    fn store_visuals(&self, post: &Post, descriptor: &ContentDescriptor) -> Result<bool> {
        let profile = visuals::extract_from_post(descriptor.image_prompts.as_slice());
        if profile.is_empty() {
            return Ok(false);
        }
        self.db.upsert_post_visuals(&post.post_id, &profile)?;
        Ok(true)
    }
}

/// A hand-labelled (post hook, generated hook) pair
#[derive(Debug, Clone, Deserialize)]
pub struct LabeledPair {
    pub post_hook: String,
    pub content_hook: String,
    pub is_match: bool,
}

/// Confusion counts for a threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatcherEvaluation {
    pub threshold: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl MatcherEvaluation {
    /// Share of predicted matches that were right. 1.0 if nothing was predicted.
    pub fn precision(&self) -> f64 {
        let predicted = self.true_positives + self.false_positives;
        if predicted == 0 {
            1.0
        } else {
            self.true_positives as f64 / predicted as f64
        }
    }

    /// Share of real matches that were found. 1.0 if there were none.
    pub fn recall(&self) -> f64 {
        let actual = self.true_positives + self.false_negatives;
        if actual == 0 {
            1.0
        } else {
            self.true_positives as f64 / actual as f64
        }
    }
}

/// Score each pair at `threshold` and tally the outcomes.
pub fn evaluate_matcher(pairs: &[LabeledPair], threshold: f64) -> MatcherEvaluation {
    let mut eval = MatcherEvaluation {
        threshold,
        ..Default::default()
    };
    for pair in pairs {
        let score = jaccard_similarity(&pair.post_hook, &pair.content_hook);
        let predicted = score > 0.0 && score >= threshold;
        match (predicted, pair.is_match) {
            (true, true) => eval.true_positives += 1,
            (true, false) => eval.false_positives += 1,
            (false, false) => eval.true_negatives += 1,
            (false, true) => eval.false_negatives += 1,
        }
    }
    eval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Platform, PostUpsert};
    use crate::visuals::VisualAttribute;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_carousel(root: &Path, dir: &str, meta: serde_json::Value, hook: Option<&str>) {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("meta.json"), meta.to_string()).unwrap();
        if let Some(hook) = hook {
            let carousel = json!({"slides": [{"text": hook}, {"text": "second slide"}]});
            std::fs::write(dir.join("carousel_data.json"), carousel.to_string()).unwrap();
        }
    }

    #[test]
    fn test_jaccard_ignores_stopwords_and_case() {
        assert_eq!(
            jaccard_similarity("5 Bedtime Mistakes", "the 5 bedtime mistakes"),
            1.0
        );
        assert_eq!(jaccard_similarity("the a an", "bedtime"), 0.0);
        assert_eq!(jaccard_similarity("", "bedtime"), 0.0);
        // {sleep, tips} vs {sleep, hacks}: 1 shared of 3
        assert!((jaccard_similarity("sleep tips", "sleep hacks") - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_find_match_threshold_and_ties() {
        let descriptor = |name: &str, hook: &str| ContentDescriptor {
            path: PathBuf::from(name),
            topic: None,
            format: None,
            hook_score: None,
            num_items: None,
            hook_text: hook.to_string(),
            image_prompts: Vec::new(),
        };
        let descriptors = vec![
            descriptor("first", "bedtime routine secrets"),
            descriptor("second", "bedtime routine secrets"),
            descriptor("weak", "routine"),
        ];

        let (best, score) = find_match("bedtime routine secrets", &descriptors, 0.4).unwrap();
        assert_eq!(best.path, PathBuf::from("first"));
        assert_eq!(score, 1.0);

        assert!(find_match("nothing in common here", &descriptors, 0.4).is_none());
        assert!(find_match("", &descriptors, 0.4).is_none());
    }

    #[test]
    fn test_index_skips_malformed() {
        let dir = TempDir::new().unwrap();
        write_carousel(
            dir.path(),
            "a",
            json!({"topic": "sleep", "format": "listicle", "num_items": 7, "hook_score": 8.5}),
            Some("5 bedtime mistakes"),
        );
        let broken = dir.path().join("b");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("meta.json"), "{not json").unwrap();
        write_carousel(dir.path(), "c/nested", json!({"topic": "naps"}), None);

        let (descriptors, skipped) = index_generated_content(dir.path()).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(descriptors[0].hook_text, "5 bedtime mistakes");
        assert_eq!(descriptors[0].num_items, Some(7));
        assert_eq!(descriptors[1].hook_text, "");
    }

    #[test]
    fn test_backfill_account_patches_posts() {
        let dir = TempDir::new().unwrap();
        write_carousel(
            dir.path(),
            "2025-02-01/bedtime",
            json!({"topic": "bedtime", "format": "listicle", "num_items": 7, "hook_score": 8.5}),
            Some("5 bedtime mistakes"),
        );

        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let mut post = PostUpsert::new("acct", Platform::TikTok, "tt_1");
        post.hook_text = Some("the 5 bedtime mistakes".to_string());
        post.url = Some("https://example.com/tt_1".to_string());
        db.upsert_post(&post).unwrap();
        let mut other = PostUpsert::new("acct", Platform::TikTok, "tt_2");
        other.hook_text = Some("completely unrelated caption".to_string());
        db.upsert_post(&other).unwrap();

        let report = BackfillMatcher::new(&db, DEFAULT_THRESHOLD)
            .backfill_account("acct", dir.path())
            .unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].post_id, "tt_1");
        assert_eq!(report.matches[0].score, 1.0);
        assert_eq!(report.unmatched, vec!["tt_2"]);

        let stored = db.get_post("tt_1").unwrap().unwrap();
        assert_eq!(stored.format.as_deref(), Some("listicle"));
        assert_eq!(stored.topic.as_deref(), Some("bedtime"));
        assert_eq!(stored.slide_count, Some(7));
        assert_eq!(stored.hook_score, Some(8.5));
        // untouched by the patch
        assert_eq!(stored.url.as_deref(), Some("https://example.com/tt_1"));
        assert_eq!(stored.hook_text.as_deref(), Some("the 5 bedtime mistakes"));

        // a second pass has nothing left to do for the matched post
        let again = BackfillMatcher::new(&db, DEFAULT_THRESHOLD)
            .backfill_account("acct", dir.path())
            .unwrap();
        assert_eq!(again.candidates, 1);
    }

    #[test]
    fn test_backfill_extracts_visuals() {
        let dir = TempDir::new().unwrap();
        let carousel_dir = dir.path().join("nap");
        std::fs::create_dir_all(&carousel_dir).unwrap();
        std::fs::write(
            carousel_dir.join("meta.json"),
            json!({"topic": "naps", "format": "step_guide", "num_items": 3}).to_string(),
        )
        .unwrap();
        std::fs::write(
            carousel_dir.join("carousel_data.json"),
            json!({
                "slides": [{"text": "nap schedule by age"}],
                "image_prompts": [
                    "Close-up of a baby asleep in a crib, soft light, calm mood",
                    "Overhead flat lay of a nursery, pastel blanket, calm and peaceful"
                ]
            })
            .to_string(),
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let mut post = PostUpsert::new("acct", Platform::Instagram, "ig_1");
        post.hook_text = Some("nap schedule by age".to_string());
        db.upsert_post(&post).unwrap();

        let report = BackfillMatcher::new(&db, DEFAULT_THRESHOLD)
            .backfill_account("acct", dir.path())
            .unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.visuals_extracted, 1);

        let stored = db.get_post_visuals("ig_1").unwrap().unwrap();
        assert_eq!(
            stored.dominant.get(&VisualAttribute::SceneSetting).map(String::as_str),
            Some("bedroom")
        );
        assert_eq!(
            stored.hook.get(&VisualAttribute::Composition).map(String::as_str),
            Some("closeup")
        );
        assert_eq!(
            stored.dominant.get(&VisualAttribute::Mood).map(String::as_str),
            Some("calm")
        );
    }

    #[test]
    fn test_backfill_fills_visuals_for_previously_matched_post() {
        let dir = TempDir::new().unwrap();
        let carousel_dir = dir.path().join("car");
        std::fs::create_dir_all(&carousel_dir).unwrap();
        std::fs::write(carousel_dir.join("meta.json"), json!({"format": "listicle"}).to_string())
            .unwrap();
        std::fs::write(
            carousel_dir.join("carousel_data.json"),
            json!({
                "slides": [{"text": "car seat mistakes"}],
                "image_prompts": ["Toddler buckled into a car seat, golden hour light"]
            })
            .to_string(),
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        // matched before visuals were tracked
        let mut post = PostUpsert::new("acct", Platform::TikTok, "tt_9");
        post.hook_text = Some("car seat mistakes".to_string());
        post.format = Some("listicle".to_string());
        db.upsert_post(&post).unwrap();

        let report = BackfillMatcher::new(&db, DEFAULT_THRESHOLD)
            .backfill_account("acct", dir.path())
            .unwrap();
        assert_eq!(report.candidates, 0);
        assert_eq!(report.visuals_extracted, 1);
        let stored = db.get_post_visuals("tt_9").unwrap().unwrap();
        assert_eq!(
            stored.dominant.get(&VisualAttribute::SceneSetting).map(String::as_str),
            Some("car")
        );
    }

    #[test]
    fn test_evaluate_matcher() {
        let pairs = vec![
            LabeledPair {
                post_hook: "5 bedtime mistakes".into(),
                content_hook: "5 bedtime mistakes parents make".into(),
                is_match: true,
            },
            LabeledPair {
                post_hook: "nap schedule".into(),
                content_hook: "nap schedule by age".into(),
                is_match: true,
            },
            LabeledPair {
                post_hook: "bedtime tips".into(),
                content_hook: "bedtime stories".into(),
                is_match: false,
            },
            LabeledPair {
                post_hook: "feeding".into(),
                content_hook: "sleep".into(),
                is_match: false,
            },
        ];

        let eval = evaluate_matcher(&pairs, 0.4);
        // 3/5 = 0.6, 2/4 = 0.5, 1/3, 0
        assert_eq!(eval.true_positives, 2);
        assert_eq!(eval.false_positives, 0);
        assert_eq!(eval.true_negatives, 2);
        assert_eq!(eval.precision(), 1.0);
        assert_eq!(eval.recall(), 1.0);

        let loose = evaluate_matcher(&pairs, 0.3);
        assert_eq!(loose.false_positives, 1);
        assert!((loose.precision() - 2.0 / 3.0).abs() < 1e-9);
    }
}
