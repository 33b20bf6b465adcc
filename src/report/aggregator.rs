//! Runs the analyzers and merges their output into an [`AuditResult`]

use crate::analysis::{
    default_analyzers, round2, Analyzer, Issue, PartialResults, Ranking, SiteSnapshot,
};
use crate::config::{Config, ScoringConfig};
use crate::crawler::CrawlStats;
use crate::report::{
    AuditResult, AuditStatus, CategoryScores, PageFailure, PageReadability, TextSummary,
    WebsiteSummary,
};
use crate::state::PageStatus;
use crate::{AuditError, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Weighted mean of the category scores, clamped to 0..=100
pub fn overall_score(scores: &CategoryScores, weights: &ScoringConfig) -> f64 {
    let total = weights.technical_weight + weights.on_page_weight + weights.text_weight;
    if total <= 0.0 {
        return 0.0;
    }
    let weighted = scores.technical * weights.technical_weight
        + scores.on_page * weights.on_page_weight
        + scores.text * weights.text_weight;
    round2((weighted / total).clamp(0.0, 100.0))
}

/// Orders issues by severity, then by the rank of their page
///
/// Site-level issues come before page issues of the same severity, and
/// pages outside the ranking come last. The sort is stable, so issues that
/// tie keep the order the stages produced them in.
pub fn sort_issues(issues: &mut [Issue], ranking: &Ranking) {
    issues.sort_by_key(|issue| {
        let position = match issue.page_url.as_deref() {
            None => 0,
            Some(url) => ranking.rank_of(url).unwrap_or(usize::MAX),
        };
        (issue.severity, position)
    });
}

/// Composes the analysis stages in a fixed order
pub struct ReportAggregator {
    analyzers: Vec<Box<dyn Analyzer>>,
    scoring: ScoringConfig,
}

impl ReportAggregator {
    pub fn new(config: &Config) -> Self {
        Self::with_analyzers(default_analyzers(config), config.scoring.clone())
    }

    pub fn with_analyzers(analyzers: Vec<Box<dyn Analyzer>>, scoring: ScoringConfig) -> Self {
        Self { analyzers, scoring }
    }

    /// Runs every analyzer in order, checking for cancellation between them
    pub fn analyze(
        &self,
        site: &SiteSnapshot<'_>,
        cancel: &CancellationToken,
    ) -> Result<PartialResults> {
        let mut partials = PartialResults::default();
        for analyzer in &self.analyzers {
            if cancel.is_cancelled() {
                return Err(AuditError::Cancelled);
            }
            tracing::info!("Running {} analysis", analyzer.name());
            let result = analyzer.analyze(site, &partials)?;
            partials.absorb(result);
        }
        Ok(partials)
    }

    /// Builds the final result from the stage outputs
    ///
    /// Missing stages count as empty with a score of 0.
    pub fn assemble(
        &self,
        site: &SiteSnapshot<'_>,
        partials: PartialResults,
        crawl: CrawlStats,
        timed_out: bool,
    ) -> Result<AuditResult> {
        let technical = partials.technical.ok_or_else(|| {
            AuditError::InvalidInput("the technical stage did not run".to_string())
        })?;
        let text = partials.text.ok_or_else(|| {
            AuditError::InvalidInput("the text stage did not run".to_string())
        })?;
        let ranking = partials.ranking.unwrap_or_default();
        let on_page = partials.on_page.unwrap_or_default();

        let category_scores = CategoryScores {
            technical: technical.score,
            on_page: on_page.average_score,
            text: text.score,
        };
        let overall_score = overall_score(&category_scores, &self.scoring);

        let mut issues: Vec<Issue> = technical.issues.clone();
        issues.extend(text.issues.iter().cloned());
        issues.extend(on_page.pages.iter().flat_map(|p| p.issues.iter().cloned()));
        sort_issues(&mut issues, &ranking);

        let failure = |status: PageStatus| -> Vec<PageFailure> {
            site.pages
                .iter()
                .filter(|p| p.status == status)
                .map(|p| PageFailure {
                    url: p.url.clone(),
                    depth: p.depth,
                    status_code: p.status_code,
                    reason: p.error_reason.clone().unwrap_or_default(),
                })
                .collect()
        };
        let failed_pages = failure(PageStatus::Failed);
        let skipped_pages = failure(PageStatus::Skipped);

        let status = if timed_out || !failed_pages.is_empty() {
            AuditStatus::PartialSuccess
        } else {
            AuditStatus::Success
        };

        let text_summary = TextSummary {
            language: text.language,
            score: text.score,
            global_keywords: text.global_keywords.clone(),
            pages: text
                .pages
                .iter()
                .map(|p| PageReadability {
                    url: p.url.clone(),
                    language: p.language,
                    word_count: p.word_count,
                    insufficient: p.insufficient,
                    readability: p.readability.as_ref().map(|r| r.score),
                    level: p.readability.as_ref().map(|r| r.level.clone()),
                    text_score: p.score,
                })
                .collect(),
        };

        let website = site.website;
        tracing::info!(
            "Audit of {} scored {} ({} issues, status {})",
            website.root_url,
            overall_score,
            issues.len(),
            status
        );

        Ok(AuditResult {
            website: WebsiteSummary {
                id: website.id,
                root_url: website.root_url.clone(),
                max_pages: website.max_pages,
                max_depth: website.max_depth,
                language: website.language.clone(),
                fingerprint: website.fingerprint.clone(),
                created_at: website.created_at,
            },
            status,
            overall_score,
            category_scores,
            top_pages: ranking.pages,
            issues,
            keyword_graph: text.keyword_graph,
            technical,
            on_page: on_page.pages,
            text: text_summary,
            failed_pages,
            skipped_pages,
            crawl,
            timed_out,
            generated_at: Utc::now(),
        })
    }
}
