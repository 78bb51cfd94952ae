//! End-to-end tests for the carousight pipeline
//!
//! Scrape (through a fake source) → backfill from a generated-content tree →
//! analyze → recommend (through a fake model) → approve → feedback merge →
//! dashboard, all against an in-memory database and temp directories.

use carousight_core::analytics::{AccountAnalyzer, Focus, FocusReport};
use carousight_core::backfill::BackfillMatcher;
use carousight_core::dashboard::write_dashboard;
use carousight_core::feedback::{apply_approved, load_performance_context};
use carousight_core::recommend::{LlmClient, Recommender};
use carousight_core::scraper::{AccountScraper, PlatformProfiles, PostSource, ScrapeOutcome, ScrapedPost};
use carousight_core::{
    Database, EngagementCounts, Error, Platform, RecommendationStatus, Result,
};
use std::path::Path;
use tempfile::TempDir;

const ACCOUNT: &str = "dreamtimelullabies";
const HOOK: &str = "Why won't my baby sleep through the night";

struct FakeSource;

impl PostSource for FakeSource {
    fn fetch_posts(&self, platform: Platform, username: &str, _limit: usize) -> Result<Vec<ScrapedPost>> {
        match platform {
            Platform::TikTok => Ok(vec![
                ScrapedPost {
                    post_id: "tt_1".to_string(),
                    url: Some(format!("https://www.tiktok.com/@{username}/video/1")),
                    caption: HOOK.to_string(),
                    published_at: None,
                    counts: EngagementCounts {
                        views: 1000,
                        likes: 50,
                        comments: 10,
                        shares: 5,
                        saves: 13,
                    },
                },
                ScrapedPost {
                    post_id: "tt_2".to_string(),
                    url: None,
                    caption: "Completely unrelated dance clip".to_string(),
                    published_at: None,
                    counts: EngagementCounts {
                        views: 200,
                        likes: 4,
                        ..Default::default()
                    },
                },
            ]),
            Platform::Instagram => Err(Error::Scraper("actor run FAILED".to_string())),
        }
    }
}

struct FakeModel;

impl LlmClient for FakeModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        assert!(prompt.contains(ACCOUNT));
        Ok(r#"```json
[
  {"category": "format_weight", "insight": "Listicles average 1,000 views vs 200 for the rest",
   "proposed_change": {"format_weights": {"listicle": 1.4}}, "confidence": "high"},
  {"category": "format_experiment", "insight": "Try 7-slide myth busters",
   "proposed_change": {"experiment_suggestions": ["7-slide myth busters"]}, "confidence": "low"},
  {"category": "made_up", "insight": "ignored", "proposed_change": {}}
]
```"#
            .to_string())
    }
}

fn write_generated(root: &Path) {
    let dir = root.join("2026-01-10_sleep");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("meta.json"),
        r#"{"topic": "sleep regression", "format": "listicle", "hook_score": 8.2, "num_items": 7}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("carousel_data.json"),
        format!(r#"{{"slides": [{{"text": "{HOOK}"}}, {{"text": "Reason one"}}]}}"#),
    )
    .unwrap();

    // Broken descriptor is skipped, not fatal
    let broken = root.join("2026-01-11_broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("meta.json"), "{ not json").unwrap();
}

fn profiles() -> PlatformProfiles {
    let mut profiles = PlatformProfiles::new();
    profiles.insert(
        ACCOUNT.to_string(),
        vec![
            (Platform::TikTok, "dreamtime".to_string()),
            (Platform::Instagram, "dreamtime".to_string()),
        ],
    );
    profiles
}

fn test_db() -> Database {
    let db = Database::open_in_memory().expect("open db");
    db.migrate().expect("migrate");
    db
}

#[test]
fn test_scrape_records_engagement_and_isolates_failures() {
    let db = test_db();
    let report = AccountScraper::new(&db, &FakeSource, 30).scrape_all(&profiles());

    let units = &report[ACCOUNT];
    assert_eq!(
        units[&Platform::TikTok],
        ScrapeOutcome::Done(carousight_core::scraper::ScrapeResult {
            new_posts: 2,
            updated_posts: 0,
        })
    );
    assert!(matches!(
        &units[&Platform::Instagram],
        ScrapeOutcome::Failed { error } if error.contains("FAILED")
    ));

    let snapshots = db.get_snapshots("tt_1").unwrap();
    assert_eq!(snapshots.len(), 1);
    assert!((snapshots[0].engagement_rate - 0.078).abs() < 1e-9);

    let post = db.get_post("tt_1").unwrap().unwrap();
    assert_eq!(post.hook_text.as_deref(), Some(HOOK));
    assert_eq!(post.platform, Platform::TikTok);

    // A second pass adds snapshots, not posts
    AccountScraper::new(&db, &FakeSource, 30).scrape_all(&profiles());
    assert_eq!(db.get_snapshots("tt_1").unwrap().len(), 2);
    assert_eq!(db.get_posts_for_account(ACCOUNT).unwrap().len(), 2);
}

#[test]
fn test_backfill_matches_exact_hook() {
    let db = test_db();
    let content = TempDir::new().unwrap();
    write_generated(content.path());
    AccountScraper::new(&db, &FakeSource, 30).scrape_all(&profiles());

    let report = BackfillMatcher::new(&db, 0.4)
        .backfill_account(ACCOUNT, content.path())
        .unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.skipped_descriptors, 1);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].post_id, "tt_1");
    assert_eq!(report.matches[0].score, 1.0);
    assert_eq!(report.unmatched, vec!["tt_2".to_string()]);

    let post = db.get_post("tt_1").unwrap().unwrap();
    assert_eq!(post.format.as_deref(), Some("listicle"));
    assert_eq!(post.topic.as_deref(), Some("sleep regression"));
    assert_eq!(post.slide_count, Some(7));
    assert_eq!(post.hook_score, Some(8.2));

    // Nothing left to match for tt_1 on a second pass
    let again = BackfillMatcher::new(&db, 0.4)
        .backfill_account(ACCOUNT, content.path())
        .unwrap();
    assert_eq!(again.candidates, 1);
}

#[test]
fn test_full_pipeline() {
    carousight_core::logging::init_test();
    let db = test_db();
    let content = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_generated(content.path());

    AccountScraper::new(&db, &FakeSource, 30).scrape_all(&profiles());
    BackfillMatcher::new(&db, 0.4)
        .backfill_account(ACCOUNT, content.path())
        .unwrap();

    let analyzer = AccountAnalyzer::new(&db);
    let report = analyzer.full_report(ACCOUNT).unwrap();
    let summary = report.summary.clone().unwrap();
    assert_eq!(summary.total_posts, 2);
    assert_eq!(summary.total_views, 1200);
    assert_eq!(report.formats.len(), 1);
    assert_eq!(report.pareto.top_formats[0].name, "listicle");
    assert_eq!(report.top_posts[0].post.post_id, "tt_1");
    assert_eq!(report.bottom_posts[0].post.post_id, "tt_2");

    match analyzer.focus_report(ACCOUNT, Focus::Failures).unwrap() {
        FocusReport::Failures { formats, .. } => {
            assert_eq!(formats.get("unknown"), Some(&1));
            assert_eq!(formats.get("listicle"), Some(&1));
        }
        other => panic!("unexpected focus report: {:?}", other),
    }

    let batch = Recommender::new(&db, &FakeModel).generate(ACCOUNT).unwrap();
    assert_eq!(batch.stored.len(), 2);
    assert_eq!(batch.skipped, 1);
    assert!(!batch.malformed);

    let pending = db.get_pending_recommendations(ACCOUNT).unwrap();
    db.update_recommendation_status(pending[0].id, RecommendationStatus::Approved)
        .unwrap();
    db.update_recommendation_status(pending[1].id, RecommendationStatus::Rejected)
        .unwrap();
    assert!(db.get_pending_recommendations(ACCOUNT).unwrap().is_empty());

    let context_path = data.path().join("accounts").join(ACCOUNT).join("performance_context.json");
    let outcome = apply_approved(&db, ACCOUNT, &context_path).unwrap();
    assert_eq!(outcome.applied, vec![pending[0].id]);

    let context = load_performance_context(&context_path).unwrap();
    assert_eq!(context.format_weight("listicle"), 1.4);
    assert_eq!(context.sample_size, 2);
    assert!(context.experiment_suggestions.is_empty());
    assert_eq!(context.approved_recommendations.len(), 1);

    let reports = analyzer.cross_account_report(&[ACCOUNT.to_string()]).unwrap();
    let path = write_dashboard(&reports, &data.path().join("dashboards")).unwrap();
    let html = std::fs::read_to_string(path).unwrap();
    assert!(html.contains(ACCOUNT));
    assert!(html.contains("listicle is your top format"));
}

#[test]
fn test_step_guide_scenario() {
    let db = test_db();
    let mut post = carousight_core::PostUpsert::new("acct", Platform::TikTok, "tt_1");
    post.format = Some("step_guide".to_string());
    db.upsert_post(&post).unwrap();
    db.insert_snapshot(
        "tt_1",
        &EngagementCounts {
            views: 10_000,
            likes: 500,
            comments: 50,
            shares: 30,
            saves: 200,
        },
    )
    .unwrap();

    let snapshot = &db.get_snapshots("tt_1").unwrap()[0];
    assert!((snapshot.engagement_rate - 0.078).abs() < 1e-9);

    let formats = db.format_comparison("acct").unwrap();
    assert_eq!(formats.len(), 1);
    assert_eq!(formats[0].name, "step_guide");
    assert_eq!(formats[0].avg_views, 10_000.0);
}

#[test]
fn test_identical_hook_scenario() {
    let db = test_db();
    let hook = "5 boring habits that fixed my baby's sleep";
    let mut post = carousight_core::PostUpsert::new("acct", Platform::Instagram, "ig_1");
    post.hook_text = Some(hook.to_string());
    db.upsert_post(&post).unwrap();

    let content = TempDir::new().unwrap();
    let dir = content.path().join("habits");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("meta.json"),
        r#"{"topic": "sleep habits", "format": "listicle", "hook_score": 9.0, "num_items": 5}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("carousel_data.json"),
        serde_json::json!({"slides": [{"text": hook}]}).to_string(),
    )
    .unwrap();

    let report = BackfillMatcher::new(&db, 0.4)
        .backfill_account("acct", content.path())
        .unwrap();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].score, 1.0);

    let post = db.get_post("ig_1").unwrap().unwrap();
    assert_eq!(post.format.as_deref(), Some("listicle"));
    assert_eq!(post.topic.as_deref(), Some("sleep habits"));
}
