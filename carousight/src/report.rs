//! Terminal output for reports, scrape passes and recommendation batches.

use carousight_core::analytics::{AccountReport, FocusReport, ParetoEntry};
use carousight_core::backfill::BackfillReport;
use carousight_core::db::{GroupStats, PostPerformance};
use carousight_core::format::{
    format_count, format_percent, format_relative_time_opt, truncate_chars,
};
use carousight_core::recommend::RecommendationBatch;
use carousight_core::scraper::{ScrapeOutcome, ScrapeReport};

pub fn print_report(report: &AccountReport, verbose: bool) {
    println!("== {} ==", report.account);

    let Some(summary) = report.summary.as_ref().filter(|s| s.total_posts > 0) else {
        println!("No posts scraped yet. Run with --scrape first.");
        println!();
        return;
    };

    println!(
        "Posts: {}   Total views: {}   Avg views: {}   Avg engagement: {}   Best: {}",
        summary.total_posts,
        format_count(summary.total_views as f64),
        format_count(summary.avg_views),
        format_percent(summary.avg_engagement_rate),
        format_count(summary.best_views as f64),
    );
    println!();

    print_groups("Formats", &report.formats);
    print_groups("Pillars", &report.pillars);

    println!("Top posts");
    print_posts(&report.top_posts);
    println!();
    println!("Bottom posts");
    print_posts(&report.bottom_posts);
    println!();

    if verbose {
        if !report.hook_correlation.is_empty() {
            println!("Hook score vs views");
            for b in &report.hook_correlation {
                println!(
                    "  score {:>2}  {:>3} posts  avg {:>7} views  {}",
                    b.hook_score,
                    b.count,
                    format_count(b.avg_views),
                    format_percent(b.avg_engagement_rate)
                );
            }
            println!();
        }
        if !report.slide_counts.is_empty() {
            println!("Slide counts");
            for s in &report.slide_counts {
                println!(
                    "  {:>2} slides  {:>3} posts  avg {:>7} views  avg {:>6} saves",
                    s.slide_count,
                    s.count,
                    format_count(s.avg_views),
                    format_count(s.avg_saves)
                );
            }
            println!();
        }
        for (attribute, groups) in &report.visuals {
            print_groups(&format!("Visuals: {}", attribute.label()), groups);
        }
    }

    if let Some(insight) = report.pareto.insight() {
        println!("80/20: {}", insight);
        println!();
    }
}

pub fn print_focus(account: &str, focus: &FocusReport) {
    println!("== {} ==", account);
    match focus {
        FocusReport::Formats { formats, ranking } => {
            print_groups("Formats", formats);
            print_ranking(ranking);
        }
        FocusReport::Pillars { pillars, ranking } => {
            print_groups("Pillars", pillars);
            print_ranking(ranking);
        }
        FocusReport::Hooks { buckets } => {
            println!("Hook score vs views");
            if buckets.is_empty() {
                println!("  (no scored posts)");
            }
            for b in buckets {
                println!(
                    "  score {:>2}  {:>3} posts  avg {:>7} views  {}",
                    b.hook_score,
                    b.count,
                    format_count(b.avg_views),
                    format_percent(b.avg_engagement_rate)
                );
            }
        }
        FocusReport::Failures {
            bottom_posts,
            formats,
        } => {
            println!("Bottom posts");
            print_posts(bottom_posts);
            if !formats.is_empty() {
                println!();
                println!("Formats among the bottom posts");
                for (format, count) in formats {
                    println!("  {:<20} {}", format, count);
                }
            }
        }
        FocusReport::Slides { slide_counts } => {
            println!("Slide counts");
            if slide_counts.is_empty() {
                println!("  (no slide counts recorded)");
            }
            for s in slide_counts {
                println!(
                    "  {:>2} slides  {:>3} posts  avg {:>7} views  avg {:>6} saves  {}",
                    s.slide_count,
                    s.count,
                    format_count(s.avg_views),
                    format_count(s.avg_saves),
                    format_percent(s.avg_engagement_rate)
                );
            }
        }
    }
    println!();
}

fn print_groups(title: &str, groups: &[GroupStats]) {
    if groups.is_empty() {
        return;
    }
    println!("{}", title);
    for g in groups {
        println!(
            "  {:<20} {:>3} posts  avg {:>7} views  avg {:>6} saves  {}",
            truncate_chars(&g.name, 20),
            g.post_count,
            format_count(g.avg_views),
            format_count(g.avg_saves),
            format_percent(g.avg_engagement_rate)
        );
    }
    println!();
}

fn print_ranking(ranking: &[ParetoEntry]) {
    if ranking.is_empty() {
        return;
    }
    println!("Share of views");
    for e in ranking {
        println!(
            "  {:<20} {:>6.1}%  (cumulative {:>5.1}%)",
            truncate_chars(&e.name, 20),
            e.share_of_total * 100.0,
            e.cumulative_share * 100.0
        );
    }
}

fn print_posts(posts: &[PostPerformance]) {
    if posts.is_empty() {
        println!("  (none)");
        return;
    }
    for (i, p) in posts.iter().enumerate() {
        let label = p
            .post
            .hook_text
            .as_deref()
            .or(p.post.topic.as_deref())
            .unwrap_or(&p.post.post_id);
        println!(
            "  {}. [{}] {:<50} {:>7} views  {:>6} saves  {}  ({})",
            i + 1,
            p.post.platform.display_name(),
            truncate_chars(&label.replace('\n', " "), 50),
            format_count(p.counts.views as f64),
            format_count(p.counts.saves as f64),
            format_percent(p.engagement_rate),
            format_relative_time_opt(p.post.published_at),
        );
    }
}

pub fn print_scrape_report(report: &ScrapeReport) {
    for (account, platforms) in report {
        println!("{}", account);
        for (platform, outcome) in platforms {
            match outcome {
                ScrapeOutcome::Done(result) => println!(
                    "  {}: {} new, {} updated",
                    platform.display_name(),
                    result.new_posts,
                    result.updated_posts
                ),
                ScrapeOutcome::Failed { error } => {
                    println!("  {}: failed: {}", platform.display_name(), error)
                }
            }
        }
    }
}

pub fn print_backfill(account: &str, report: &BackfillReport, verbose: bool) {
    println!(
        "{}: backfill matched {}/{} posts",
        account,
        report.matches.len(),
        report.candidates
    );
    if report.skipped_descriptors > 0 {
        println!("  {} descriptor(s) could not be read", report.skipped_descriptors);
    }
    if report.visuals_extracted > 0 {
        println!("  visual attributes extracted for {} post(s)", report.visuals_extracted);
    }
    if verbose {
        for m in &report.matches {
            println!("  {} -> {} ({:.2})", m.post_id, m.descriptor.display(), m.score);
        }
        for post_id in &report.unmatched {
            println!("  {} unmatched", post_id);
        }
    }
}

pub fn print_batch(account: &str, batch: &RecommendationBatch) {
    if batch.malformed {
        println!("{}: model response could not be parsed, nothing stored", account);
        return;
    }
    print!("{}: {} recommendation(s) stored", account, batch.stored.len());
    if batch.skipped > 0 {
        print!(" ({} invalid skipped)", batch.skipped);
    }
    println!();
}
