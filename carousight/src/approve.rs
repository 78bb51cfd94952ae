//! Interactive review of pending recommendations.

use anyhow::Result;
use carousight_core::{Database, Recommendation, RecommendationStatus};
use std::io::{BufRead, Write};

/// Tally of one review session
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub approved: usize,
    pub rejected: usize,
    pub skipped: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Approve,
    Reject,
    Skip,
}

fn parse_answer(line: &str) -> Option<Answer> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Answer::Approve),
        "n" | "no" => Some(Answer::Reject),
        "" | "s" | "skip" => Some(Answer::Skip),
        _ => None,
    }
}

/// Walk the account's pending recommendations, asking y/n/s for each.
///
/// Empty input means skip. End of input skips everything that is left.
pub fn review_pending<R: BufRead, W: Write>(
    db: &Database,
    account: &str,
    input: &mut R,
    out: &mut W,
) -> Result<ReviewSummary> {
    let pending = db.get_pending_recommendations(account)?;
    let mut summary = ReviewSummary::default();
    if pending.is_empty() {
        return Ok(summary);
    }

    writeln!(out, "{} pending recommendation(s) for {}", pending.len(), account)?;

    for (index, rec) in pending.iter().enumerate() {
        write_recommendation(out, index + 1, pending.len(), rec)?;

        let answer = loop {
            write!(out, "Approve? [y/n/S] ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                summary.skipped += pending.len() - index;
                return Ok(summary);
            }
            match parse_answer(&line) {
                Some(answer) => break answer,
                None => writeln!(out, "Please answer y, n or s.")?,
            }
        };

        match answer {
            Answer::Approve => {
                db.update_recommendation_status(rec.id, RecommendationStatus::Approved)?;
                tracing::info!(account, recommendation_id = rec.id, "Recommendation approved");
                summary.approved += 1;
            }
            Answer::Reject => {
                db.update_recommendation_status(rec.id, RecommendationStatus::Rejected)?;
                tracing::info!(account, recommendation_id = rec.id, "Recommendation rejected");
                summary.rejected += 1;
            }
            Answer::Skip => summary.skipped += 1,
        }
    }

    Ok(summary)
}

fn write_recommendation<W: Write>(
    out: &mut W,
    position: usize,
    total: usize,
    rec: &Recommendation,
) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "[{}/{}] [{}] {}",
        position,
        total,
        rec.confidence.as_str().to_uppercase(),
        rec.category
    )?;
    writeln!(out, "  {}", rec.insight)?;
    writeln!(out, "  Proposed change: {}", rec.proposed_change)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousight_core::{
        Confidence, ProposedChange, RecommendationCategory, RecommendationDraft,
    };
    use std::io::Cursor;

    fn db_with_pending(n: usize) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        for i in 0..n {
            db.create_recommendation(
                "acct",
                &RecommendationDraft {
                    category: RecommendationCategory::HookStyle,
                    insight: format!("Insight {i}"),
                    proposed_change: ProposedChange::try_from(serde_json::json!({
                        "hook_insights": {"best_styles": ["question"]}
                    }))
                    .unwrap(),
                    confidence: Confidence::High,
                },
            )
            .unwrap();
        }
        db
    }

    fn review(db: &Database, input: &str) -> (ReviewSummary, String) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let summary = review_pending(db, "acct", &mut reader, &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_answers_apply_statuses() {
        let db = db_with_pending(3);
        let (summary, out) = review(&db, "y\nn\n\n");

        assert_eq!(
            summary,
            ReviewSummary {
                approved: 1,
                rejected: 1,
                skipped: 1
            }
        );
        assert!(out.contains("[1/3] [HIGH] hook_style"));
        assert!(out.contains("best_styles"));
        assert_eq!(db.get_approved_recommendations("acct").unwrap().len(), 1);
        assert_eq!(db.get_pending_recommendations("acct").unwrap().len(), 1);
    }

    #[test]
    fn test_eof_skips_remaining() {
        let db = db_with_pending(3);
        let (summary, _) = review(&db, "Y\n");
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(db.get_pending_recommendations("acct").unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_answer_reprompts() {
        let db = db_with_pending(1);
        let (summary, out) = review(&db, "maybe\nn\n");
        assert_eq!(summary.rejected, 1);
        assert!(out.contains("Please answer y, n or s."));
    }

    #[test]
    fn test_nothing_pending() {
        let db = db_with_pending(0);
        let (summary, out) = review(&db, "y\n");
        assert_eq!(summary, ReviewSummary::default());
        assert!(out.is_empty());
    }
}
