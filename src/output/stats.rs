//! Console summaries
//!
//! This module prints short summaries of a finished audit, the pages
//! stored for it and the entries of the result cache.

use crate::analysis::Severity;
use crate::audit::AuditOutcome;
use crate::cache::{CacheEntry, EntryKind};
use crate::output::OutputResult;
use crate::state::PageStatus;
use crate::storage::Storage;
use chrono::{DateTime, Utc};

/// Stored page counts of one website
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStatistics {
    pub website_id: i64,
    pub parsed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl PageStatistics {
    pub fn total(&self) -> u64 {
        self.parsed + self.failed + self.skipped
    }

    /// Share of stored pages that were parsed, in percent
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.parsed as f64 / total as f64 * 100.0,
        }
    }
}

/// Loads page counts of a website from storage
pub fn load_page_statistics(
    storage: &dyn Storage,
    website_id: i64,
) -> OutputResult<PageStatistics> {
    Ok(PageStatistics {
        website_id,
        parsed: storage.count_pages_by_status(website_id, PageStatus::Parsed)?,
        failed: storage.count_pages_by_status(website_id, PageStatus::Failed)?,
        skipped: storage.count_pages_by_status(website_id, PageStatus::Skipped)?,
    })
}

/// Prints a finished audit to stdout
pub fn print_audit_summary(outcome: &AuditOutcome, pages: Option<&PageStatistics>) {
    let result = &outcome.result;

    println!("=== SEO Audit: {} ===\n", result.website.root_url);
    if outcome.from_cache {
        println!(
            "(cached result from {})\n",
            result.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    println!("Status: {}", result.status);
    println!("Overall score: {:.2}", result.overall_score);
    println!("  Technical: {:.2}", result.category_scores.technical);
    println!("  On-page:   {:.2}", result.category_scores.on_page);
    println!("  Text:      {:.2}", result.category_scores.text);
    println!();

    println!(
        "Issues: {} critical, {} warning, {} info",
        result.count_by_severity(Severity::Critical),
        result.count_by_severity(Severity::Warning),
        result.count_by_severity(Severity::Info)
    );
    for issue in result
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Critical)
        .take(10)
    {
        match &issue.page_url {
            Some(url) => println!("  ! {} ({})", issue.message, url),
            None => println!("  ! {}", issue.message),
        }
    }
    println!();

    if !result.top_pages.is_empty() {
        println!("Top pages:");
        for page in result.top_pages.iter().take(5) {
            println!("  {:>2}. {} ({:.2})", page.rank, page.url, page.score);
        }
        println!();
    }

    match pages {
        Some(stats) => println!(
            "Pages: {} parsed, {} failed, {} skipped ({:.1}% parsed)",
            stats.parsed,
            stats.failed,
            stats.skipped,
            stats.success_rate()
        ),
        None => println!(
            "Pages: {} parsed, {} failed, {} skipped",
            result.crawl.parsed, result.crawl.failed, result.crawl.skipped
        ),
    }
    if result.timed_out {
        println!("The audit timeout stopped the crawl early; this result was not cached.");
    }
}

/// Prints cache entries, newest first
pub fn print_cache_entries(entries: &[CacheEntry], now: DateTime<Utc>) {
    if entries.is_empty() {
        println!("The cache is empty.");
        return;
    }

    println!("=== Cached Audits ({}) ===\n", entries.len());
    for entry in entries {
        let kind = match entry.kind {
            EntryKind::Result => "result",
            EntryKind::Failure => "failure",
        };
        let state = if entry.is_expired(now) { " (expired)" } else { "" };
        println!(
            "  {} {:<7} {} expires {}{}",
            &entry.fingerprint[..entry.fingerprint.len().min(12)],
            kind,
            entry.root_url,
            entry.expires_at().format("%Y-%m-%d %H:%M"),
            state
        );
    }
}
