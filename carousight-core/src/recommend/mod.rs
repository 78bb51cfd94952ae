//! LLM-backed strategy recommendations.
//!
//! The recommender turns an account's [`AccountReport`](crate::analytics::AccountReport)
//! into a prompt, asks the model for a JSON array of suggestions, and stores
//! every valid one as a `pending` recommendation for human review.

pub mod llm;
pub mod prompt;

pub use llm::{create_llm_client, HttpLlmClient, LlmClient};
pub use prompt::{build_prompt, parse_recommendations, ParsedRecommendations};

use crate::analytics::AccountAnalyzer;
use crate::db::Database;
use crate::error::Result;
use crate::types::Recommendation;
use serde::Serialize;

/// Result of one generation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationBatch {
    /// Newly stored, all pending
    pub stored: Vec<Recommendation>,
    /// Elements the model returned that failed validation
    pub skipped: usize,
    /// The response held no usable JSON array
    pub malformed: bool,
}

pub struct Recommender<'a> {
    db: &'a Database,
    client: &'a dyn LlmClient,
}

impl<'a> Recommender<'a> {
    pub fn new(db: &'a Database, client: &'a dyn LlmClient) -> Self {
        Self { db, client }
    }

    /// Generate and store recommendations for one account.
    ///
    /// An account without data yields an empty batch and the model is not
    /// called. Transport errors propagate; an unparseable response does not.
    pub fn generate(&self, account: &str) -> Result<RecommendationBatch> {
        let report = AccountAnalyzer::new(self.db).full_report(account)?;
        if report.is_empty() {
            tracing::warn!(account, "No data, skipping recommendations");
            return Ok(RecommendationBatch::default());
        }

        let prompt = build_prompt(&report)?;
        let raw = self.client.complete(&prompt)?;
        let parsed = parse_recommendations(&raw);

        if parsed.malformed {
            let preview: String = raw.chars().take(200).collect();
            tracing::error!(account, response = %preview, "Failed to parse recommendations");
        }

        let mut batch = RecommendationBatch {
            skipped: parsed.skipped,
            malformed: parsed.malformed,
            ..Default::default()
        };
        for draft in &parsed.drafts {
            let id = self.db.create_recommendation(account, draft)?;
            if let Some(rec) = self.db.get_recommendation(id)? {
                batch.stored.push(rec);
            }
        }

        tracing::info!(
            account,
            stored = batch.stored.len(),
            skipped = batch.skipped,
            "Generated recommendations"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementCounts, Platform, PostUpsert, RecommendationStatus};
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockClient {
        response: std::result::Result<String, String>,
        calls: AtomicUsize,
    }

    impl MockClient {
        fn replying(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LlmClient for MockClient {
        fn complete(&self, prompt: &str) -> Result<String> {
            assert!(prompt.contains("Analysis data"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().map_err(Error::Llm)
        }
    }

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let mut post = PostUpsert::new("acct", Platform::TikTok, "tt_1");
        post.format = Some("listicle".to_string());
        db.upsert_post(&post).unwrap();
        db.insert_snapshot(
            "tt_1",
            &EngagementCounts {
                views: 1000,
                likes: 50,
                ..Default::default()
            },
        )
        .unwrap();
        db
    }

    #[test]
    fn test_no_data_skips_model() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let client = MockClient::replying("[]");

        let batch = Recommender::new(&db, &client).generate("empty").unwrap();
        assert!(batch.stored.is_empty());
        assert!(!batch.malformed);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_generate_stores_pending() {
        let db = seeded_db();
        let client = MockClient::replying(
            r#"[{"category": "format_weight", "insight": "Listicles get 1,000 views",
                 "proposed_change": {"format_weights": {"listicle": 1.2}}, "confidence": "high"},
                {"category": "nonsense", "insight": "x", "proposed_change": {}}]"#,
        );

        let batch = Recommender::new(&db, &client).generate("acct").unwrap();
        assert_eq!(batch.stored.len(), 1);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.stored[0].status, RecommendationStatus::Pending);
        assert_eq!(db.get_pending_recommendations("acct").unwrap().len(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_response_stores_nothing() {
        let db = seeded_db();
        let client = MockClient::replying("Sorry, I can't produce JSON today.");

        let batch = Recommender::new(&db, &client).generate("acct").unwrap();
        assert!(batch.malformed);
        assert!(batch.stored.is_empty());
        assert!(db.get_pending_recommendations("acct").unwrap().is_empty());
    }

    #[test]
    fn test_transport_error_propagates() {
        let db = seeded_db();
        let client = MockClient {
            response: Err("connection reset".to_string()),
            calls: AtomicUsize::new(0),
        };
        let err = Recommender::new(&db, &client).generate("acct").unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }
}
