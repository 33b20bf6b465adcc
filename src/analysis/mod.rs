//! Analysis stages run over a finished crawl
//!
//! Every stage implements [`Analyzer`]: it reads the crawled site through a
//! [`SiteSnapshot`] plus the results of earlier stages and produces one
//! [`PartialResult`]. The report aggregator runs them in a fixed order:
//!
//! 1. `TechnicalChecker` - site-level infrastructure checks
//! 2. `TextAnalyzer` - keywords, readability and the keyword graph
//! 3. `PageRanker` - importance scores and the top-N selection
//! 4. `OnPageAnalyzer` - element checks on ranked pages only

pub mod onpage;
pub mod ranker;
pub mod technical;
pub mod text;

pub use onpage::{CheckScore, OnPageAnalyzer, OnPageReport, OnPageResult};
pub use ranker::{PageRanker, RankedPage, Ranking, ScoreBreakdown};
pub use technical::{
    CategoryResult, CoreWebVitals, TechnicalCategory, TechnicalChecker, TechnicalReport,
    VitalRating,
};
pub use text::{
    GlobalKeyword, KeywordGraph, KeywordStat, PageText, Readability, TextAnalyzer, TextReport,
};

use crate::audit::Language;
use crate::config::Config;
use crate::crawler::{LinkGraph, SiteSignals};
use crate::storage::{PageRecord, WebsiteRecord};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How urgent an issue is; orders `Critical` first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage an issue came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Technical,
    OnPage,
    Text,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::OnPage => "on_page",
            Self::Text => "text",
        }
    }
}

/// A finding with a human-actionable message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: IssueCategory,
    /// Short identifier of the check that raised it, e.g. `title_length`
    pub check: String,
    pub message: String,
    /// None for site-level issues
    pub page_url: Option<String>,
    pub recommendation: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        check: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            check: check.to_string(),
            message: message.into(),
            page_url: None,
            recommendation: String::new(),
        }
    }

    pub fn on_page(mut self, url: &str) -> Self {
        self.page_url = Some(url.to_string());
        self
    }

    pub fn recommend(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }
}

/// Read-only view of a crawled site handed to every analyzer
#[derive(Debug, Clone, Copy)]
pub struct SiteSnapshot<'a> {
    pub website: &'a WebsiteRecord,
    pub root: &'a Url,
    /// All persisted pages in discovery order
    pub pages: &'a [PageRecord],
    pub graph: &'a LinkGraph,
    pub signals: &'a SiteSignals,
    /// The requested language; `Auto` means detect per page
    pub language: Language,
    /// Token matched against robots.txt user-agent groups
    pub robots_token: &'a str,
}

impl<'a> SiteSnapshot<'a> {
    pub fn parsed_pages(&self) -> impl Iterator<Item = &'a PageRecord> {
        self.pages.iter().filter(|p| p.is_parsed())
    }

    pub fn page_by_order(&self, order: u32) -> Option<&'a PageRecord> {
        self.pages.iter().find(|p| p.discovery_order == order)
    }
}

/// Output of one analyzer
#[derive(Debug, Clone)]
pub enum PartialResult {
    Technical(TechnicalReport),
    Text(TextReport),
    Ranking(Ranking),
    OnPage(OnPageReport),
}

/// Results collected so far, readable by later stages
#[derive(Debug, Clone, Default)]
pub struct PartialResults {
    pub technical: Option<TechnicalReport>,
    pub text: Option<TextReport>,
    pub ranking: Option<Ranking>,
    pub on_page: Option<OnPageReport>,
}

impl PartialResults {
    pub fn absorb(&mut self, result: PartialResult) {
        match result {
            PartialResult::Technical(r) => self.technical = Some(r),
            PartialResult::Text(r) => self.text = Some(r),
            PartialResult::Ranking(r) => self.ranking = Some(r),
            PartialResult::OnPage(r) => self.on_page = Some(r),
        }
    }
}

/// One stage of the analysis pipeline
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Analyzes the site, reading whatever earlier stages produced
    fn analyze(&self, site: &SiteSnapshot<'_>, prior: &PartialResults) -> Result<PartialResult>;
}

/// The analyzers of a full audit, in execution order
pub fn default_analyzers(config: &Config) -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(TechnicalChecker),
        Box::new(TextAnalyzer),
        Box::new(PageRanker::new(config.ranking.clone())),
        Box::new(OnPageAnalyzer),
    ]
}

/// Rounds to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of `part` in `total` as a ratio, 0 when `total` is 0
pub(crate) fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
