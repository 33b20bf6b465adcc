//! The audit report
//!
//! [`AuditResult`] is the fully serializable outcome of one audit. It is
//! what the cache stores and what the output writers render.

mod aggregator;

pub use aggregator::{overall_score, sort_issues, ReportAggregator};
pub use crate::state::AuditStatus;

use crate::analysis::{
    GlobalKeyword, Issue, KeywordGraph, OnPageResult, RankedPage, Severity, TechnicalReport,
};
use crate::audit::Language;
use crate::crawler::CrawlStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The audited site and the parameters it was audited with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteSummary {
    pub id: i64,
    pub root_url: String,
    pub max_pages: u32,
    pub max_depth: u32,
    pub language: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub technical: f64,
    pub on_page: f64,
    pub text: f64,
}

/// A page that did not reach `Parsed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFailure {
    pub url: String,
    pub depth: u32,
    pub status_code: Option<u16>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReadability {
    pub url: String,
    pub language: Language,
    pub word_count: usize,
    pub insufficient: bool,
    pub readability: Option<f64>,
    pub level: Option<String>,
    pub text_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSummary {
    pub language: Language,
    pub score: f64,
    pub global_keywords: Vec<GlobalKeyword>,
    pub pages: Vec<PageReadability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub website: WebsiteSummary,
    pub status: AuditStatus,
    pub overall_score: f64,
    pub category_scores: CategoryScores,
    /// Ranked pages, best first
    pub top_pages: Vec<RankedPage>,
    /// All issues, most urgent first
    pub issues: Vec<Issue>,
    pub keyword_graph: KeywordGraph,
    pub technical: TechnicalReport,
    pub on_page: Vec<OnPageResult>,
    pub text: TextSummary,
    pub failed_pages: Vec<PageFailure>,
    pub skipped_pages: Vec<PageFailure>,
    pub crawl: CrawlStats,
    /// The whole-audit timeout cut the crawl short
    pub timed_out: bool,
    pub generated_at: DateTime<Utc>,
}

impl AuditResult {
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}
