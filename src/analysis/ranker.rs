//! Page importance ranking
//!
//! Score per parsed page:
//!
//! ```text
//! homepage_bonus            if the page is the root
//! + depth_weight / (depth + 1)
//! + min(inlinks * inlink_weight, inlink_cap)
//! + content_weight * min(words / 300, 1)
//! + metadata_weight * (title + description + h1 present)
//! ```
//!
//! Pages are sorted by score, then shallower depth, then earlier discovery,
//! which makes the top-N selection reproducible for a given graph.

use crate::analysis::{round2, Analyzer, PartialResult, PartialResults, SiteSnapshot};
use crate::config::RankingConfig;
use crate::storage::PageRecord;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Words of extracted text that earn the full content component
const SUBSTANTIAL_WORDS: f64 = 300.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub homepage: f64,
    pub depth: f64,
    pub inlinks: f64,
    pub content: f64,
    pub metadata: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.homepage + self.depth + self.inlinks + self.content + self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPage {
    /// 1-based position in the ranking
    pub rank: usize,
    pub page_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub depth: u32,
    pub discovery_order: u32,
    pub inlinks: usize,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// The selected top pages, best first
    pub pages: Vec<RankedPage>,
    /// Parsed pages that were scored
    pub total_ranked: usize,
}

impl Ranking {
    /// 1-based rank of a page URL, if it was selected
    pub fn rank_of(&self, url: &str) -> Option<usize> {
        self.pages.iter().find(|p| p.url == url).map(|p| p.rank)
    }
}

#[derive(Debug, Clone)]
pub struct PageRanker {
    config: RankingConfig,
}

impl Analyzer for PageRanker {
    fn name(&self) -> &'static str {
        "ranker"
    }

    fn analyze(&self, site: &SiteSnapshot<'_>, _prior: &PartialResults) -> Result<PartialResult> {
        Ok(PartialResult::Ranking(self.rank(site)))
    }
}

impl PageRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    fn score(&self, page: &PageRecord, inlinks: usize) -> ScoreBreakdown {
        let c = &self.config;
        let words = page.text.split_whitespace().count() as f64;
        let metadata_present = [
            page.title.as_deref().is_some_and(|t| !t.trim().is_empty()),
            page.meta_description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty()),
            page.meta.h1s().any(|h| !h.text.trim().is_empty()),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        ScoreBreakdown {
            homepage: if page.depth == 0 { c.homepage_bonus } else { 0.0 },
            depth: c.depth_weight / f64::from(page.depth + 1),
            inlinks: (inlinks as f64 * c.inlink_weight).min(c.inlink_cap),
            content: c.content_weight * (words / SUBSTANTIAL_WORDS).min(1.0),
            metadata: c.metadata_weight * metadata_present as f64,
        }
    }

    /// Scores every parsed page and keeps the top N
    pub fn rank(&self, site: &SiteSnapshot<'_>) -> Ranking {
        let inlinks = site.graph.internal_inlink_counts();

        let mut scored: Vec<(&PageRecord, usize, ScoreBreakdown)> = site
            .parsed_pages()
            .map(|page| {
                let count = inlinks.get(&page.discovery_order).copied().unwrap_or(0);
                (page, count, self.score(page, count))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.total()
                .partial_cmp(&a.2.total())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.depth.cmp(&b.0.depth))
                .then_with(|| a.0.discovery_order.cmp(&b.0.discovery_order))
        });

        let total_ranked = scored.len();
        let pages = scored
            .into_iter()
            .take(self.config.top_n)
            .enumerate()
            .map(|(i, (page, inlinks, breakdown))| RankedPage {
                rank: i + 1,
                page_id: page.id,
                url: page.url.clone(),
                title: page.title.clone(),
                depth: page.depth,
                discovery_order: page.discovery_order,
                inlinks,
                score: round2(breakdown.total()),
                breakdown,
            })
            .collect();

        Ranking {
            pages,
            total_ranked,
        }
    }
}
