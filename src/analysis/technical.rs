//! Site-level technical checks
//!
//! Eleven weighted categories, each scored 0-100 with a pass flag and a
//! list of details. The technical score is the weighted mean.

use crate::analysis::{
    ratio, round2, Analyzer, Issue, IssueCategory, PartialResult, PartialResults, Severity,
    SiteSnapshot,
};
use crate::robots::RobotsStatus;
use crate::state::PageStatus;
use crate::storage::PageRecord;
use crate::url::normalize_url;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Paths that should never be blocked by robots.txt
const IMPORTANT_PATHS: [&str; 5] = ["/about", "/contact", "/products", "/services", "/blog"];

/// Categories pass at or above this score
const PASS_SCORE: f64 = 70.0;

const TITLE_RANGE: (usize, usize) = (30, 60);
const DESCRIPTION_RANGE: (usize, usize) = (70, 160);

const LCP_GOOD: f64 = 2.5;
const LCP_POOR: f64 = 4.0;

/// Time from first byte to largest paint assumed for a static HTML page
const RENDER_ALLOWANCE_SECS: f64 = 1.0;

/// Transfer rate used to turn body size into download time
const ASSUMED_BYTES_PER_SEC: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalCategory {
    RobotsTxt,
    Sitemap,
    SiteStructure,
    CoreWebVitals,
    Redirects,
    Canonical,
    MetaTags,
    StructuredData,
    Links,
    Mobile,
    Https,
}

impl TechnicalCategory {
    pub fn all() -> [Self; 11] {
        [
            Self::RobotsTxt,
            Self::Sitemap,
            Self::SiteStructure,
            Self::CoreWebVitals,
            Self::Redirects,
            Self::Canonical,
            Self::MetaTags,
            Self::StructuredData,
            Self::Links,
            Self::Mobile,
            Self::Https,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RobotsTxt => "robots_txt",
            Self::Sitemap => "sitemap",
            Self::SiteStructure => "site_structure",
            Self::CoreWebVitals => "core_web_vitals",
            Self::Redirects => "redirects",
            Self::Canonical => "canonical",
            Self::MetaTags => "meta_tags",
            Self::StructuredData => "structured_data",
            Self::Links => "links",
            Self::Mobile => "mobile",
            Self::Https => "https",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::RobotsTxt => 0.05,
            Self::Sitemap => 0.05,
            Self::SiteStructure => 0.10,
            Self::CoreWebVitals => 0.15,
            Self::Redirects => 0.05,
            Self::Canonical => 0.05,
            Self::MetaTags => 0.15,
            Self::StructuredData => 0.10,
            Self::Links => 0.10,
            Self::Mobile => 0.10,
            Self::Https => 0.10,
        }
    }
}

/// Outcome of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: TechnicalCategory,
    pub weight: f64,
    pub score: f64,
    pub passed: bool,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalRating {
    Good,
    NeedsImprovement,
    Poor,
}

/// Core Web Vitals estimate
///
/// Never a measurement: `estimated` is always true and `source` says what
/// the number was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreWebVitals {
    pub estimated: bool,
    pub source: String,
    /// Estimated largest contentful paint; None for the placeholder
    pub lcp_seconds: Option<f64>,
    pub rating: VitalRating,
    pub mean_response_ms: Option<f64>,
    pub mean_body_kb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalReport {
    pub score: f64,
    pub categories: Vec<CategoryResult>,
    pub core_web_vitals: CoreWebVitals,
    pub issues: Vec<Issue>,
}

impl TechnicalReport {
    pub fn category(&self, category: TechnicalCategory) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Score, details and issues of one category before weighting
struct Check {
    score: f64,
    details: Vec<String>,
    issues: Vec<Issue>,
}

impl Check {
    fn new() -> Self {
        Self {
            score: 100.0,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn scored(score: f64) -> Self {
        Self {
            score,
            ..Self::new()
        }
    }

    fn deduct(&mut self, points: f64) {
        self.score -= points;
    }

    fn detail(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    fn issue(
        &mut self,
        severity: Severity,
        check: &str,
        message: impl Into<String>,
        recommendation: &str,
    ) {
        self.issues.push(
            Issue::new(severity, IssueCategory::Technical, check, message).recommend(recommendation),
        );
    }
}

/// Runs the technical categories over the whole crawled set
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalChecker;

impl Analyzer for TechnicalChecker {
    fn name(&self) -> &'static str {
        "technical"
    }

    fn analyze(&self, site: &SiteSnapshot<'_>, _prior: &PartialResults) -> Result<PartialResult> {
        Ok(PartialResult::Technical(self.check(site)))
    }
}

impl TechnicalChecker {
    pub fn check(&self, site: &SiteSnapshot<'_>) -> TechnicalReport {
        let parsed: Vec<&PageRecord> = site.parsed_pages().collect();
        let (core_web_vitals, cwv_check) = check_core_web_vitals(&parsed);

        let mut categories = Vec::with_capacity(11);
        let mut issues = Vec::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        let mut cwv_check = Some(cwv_check);
        for category in TechnicalCategory::all() {
            let check = match category {
                TechnicalCategory::RobotsTxt => check_robots(site),
                TechnicalCategory::Sitemap => check_sitemap(site, &parsed),
                TechnicalCategory::SiteStructure => check_site_structure(site, &parsed),
                TechnicalCategory::CoreWebVitals => cwv_check.take().unwrap_or_else(Check::new),
                TechnicalCategory::Redirects => check_redirects(site, &parsed),
                TechnicalCategory::Canonical => check_canonical(&parsed),
                TechnicalCategory::MetaTags => check_meta_tags(&parsed),
                TechnicalCategory::StructuredData => check_structured_data(&parsed),
                TechnicalCategory::Links => check_links(site, &parsed),
                TechnicalCategory::Mobile => check_mobile(&parsed),
                TechnicalCategory::Https => check_https(site),
            };

            let score = round2(check.score.clamp(0.0, 100.0));
            weighted += score * category.weight();
            total_weight += category.weight();
            issues.extend(check.issues);
            categories.push(CategoryResult {
                category,
                weight: category.weight(),
                score,
                passed: score >= PASS_SCORE,
                details: check.details,
            });
        }

        let score = if total_weight > 0.0 {
            round2((weighted / total_weight).clamp(0.0, 100.0))
        } else {
            0.0
        };

        tracing::debug!(
            "Technical score {} from {} parsed pages, {} issues",
            score,
            parsed.len(),
            issues.len()
        );

        TechnicalReport {
            score,
            categories,
            core_web_vitals,
            issues,
        }
    }
}

fn check_robots(site: &SiteSnapshot<'_>) -> Check {
    let Some(robots) = &site.signals.robots else {
        let mut check = Check::scored(50.0);
        check.detail("robots.txt was not checked");
        return check;
    };

    match robots.status {
        RobotsStatus::Missing => {
            let mut check = Check::scored(40.0);
            check.detail(format!("{} not found", robots.url));
            check.issue(
                Severity::Warning,
                "robots_missing",
                "robots.txt not found",
                "Publish a robots.txt that declares your sitemap and crawl rules",
            );
            return check;
        }
        RobotsStatus::Unavailable => {
            let mut check = Check::scored(50.0);
            check.detail(format!("{} could not be fetched", robots.url));
            check.issue(
                Severity::Warning,
                "robots_unavailable",
                "robots.txt could not be fetched",
                "Make sure robots.txt answers with 200 or 404, never a server error",
            );
            return check;
        }
        RobotsStatus::Found => {}
    }

    let mut check = Check::new();
    check.detail(format!("{} found", robots.url));

    if !robots.robots.is_valid() {
        check.deduct(30.0);
        check.detail("file contains unknown directives or no User-agent line");
        check.issue(
            Severity::Warning,
            "robots_invalid",
            "robots.txt has syntax problems",
            "Start every group with a User-agent line and use only standard directives",
        );
    }

    if robots.robots.sitemaps().is_empty() {
        check.deduct(20.0);
        check.detail("no Sitemap directive");
        check.issue(
            Severity::Info,
            "robots_no_sitemap",
            "robots.txt does not declare a sitemap",
            "Add a `Sitemap:` line pointing at your XML sitemap",
        );
    }

    let blocked: Vec<&str> = IMPORTANT_PATHS
        .iter()
        .copied()
        .filter(|path| {
            site.root
                .join(path)
                .map(|url| !robots.is_allowed(&url, site.robots_token))
                .unwrap_or(false)
        })
        .collect();
    if !blocked.is_empty() {
        check.deduct(40.0);
        check.detail(format!("blocked important paths: {}", blocked.join(", ")));
        check.issue(
            Severity::Warning,
            "robots_blocks_important",
            format!("robots.txt blocks important paths: {}", blocked.join(", ")),
            "Remove Disallow rules covering pages you want indexed",
        );
    }

    check
}

fn check_sitemap(site: &SiteSnapshot<'_>, parsed: &[&PageRecord]) -> Check {
    let sitemap = &site.signals.sitemap;
    let location = sitemap.url.as_deref().unwrap_or("/sitemap.xml");

    if !sitemap.found {
        let mut check = Check::scored(30.0);
        check.detail(format!(
            "{} not available ({})",
            location,
            sitemap.error.as_deref().unwrap_or("not fetched")
        ));
        check.issue(
            Severity::Warning,
            "sitemap_missing",
            format!("No XML sitemap found at {}", location),
            "Publish an XML sitemap and reference it from robots.txt",
        );
        return check;
    }

    if !sitemap.valid {
        let mut check = Check::scored(40.0);
        check.detail(format!("{} is not a sitemap document", location));
        check.issue(
            Severity::Warning,
            "sitemap_invalid",
            format!("{} is not a valid XML sitemap", location),
            "Serve a <urlset> or <sitemapindex> document",
        );
        return check;
    }

    let mut check = Check::new();
    check.detail(format!("{} lists {} URLs", location, sitemap.entries.len()));

    if sitemap.entries.is_empty() {
        check.deduct(40.0);
        check.issue(
            Severity::Warning,
            "sitemap_empty",
            "The sitemap lists no URLs",
            "List every indexable page in the sitemap",
        );
        return check;
    }

    let lastmod = sitemap.lastmod_ratio();
    check.detail(format!("{:.0}% of entries have <lastmod>", lastmod * 100.0));
    if lastmod < 0.5 {
        check.deduct(15.0);
        check.issue(
            Severity::Info,
            "sitemap_lastmod",
            format!(
                "Only {:.0}% of sitemap URLs carry a last-modified date",
                lastmod * 100.0
            ),
            "Add <lastmod> to sitemap entries so crawlers can prioritise changes",
        );
    }

    let listed: HashSet<String> = sitemap
        .entries
        .iter()
        .filter_map(|e| normalize_url(&e.loc).ok())
        .map(|u| u.to_string())
        .collect();
    let covered = parsed.iter().filter(|p| listed.contains(&p.url)).count();
    let coverage = ratio(covered, parsed.len());
    check.detail(format!(
        "{} of {} crawled pages are listed",
        covered,
        parsed.len()
    ));
    if !parsed.is_empty() && coverage < 0.5 {
        check.deduct(20.0);
        check.issue(
            Severity::Info,
            "sitemap_coverage",
            format!(
                "{} of {} crawled pages are missing from the sitemap",
                parsed.len() - covered,
                parsed.len()
            ),
            "Regenerate the sitemap so it lists the pages linked from your site",
        );
    }

    check
}

fn check_site_structure(site: &SiteSnapshot<'_>, parsed: &[&PageRecord]) -> Check {
    let mut check = Check::new();
    if parsed.is_empty() {
        check.score = 0.0;
        check.detail("no parsed pages");
        return check;
    }

    let mut distribution: BTreeMap<u32, usize> = BTreeMap::new();
    for page in parsed {
        *distribution.entry(page.depth).or_default() += 1;
    }
    let max_depth = distribution.keys().next_back().copied().unwrap_or(0);
    let summary: Vec<String> = distribution
        .iter()
        .map(|(depth, count)| format!("depth {}: {}", depth, count))
        .collect();
    check.detail(format!("{} pages ({})", parsed.len(), summary.join(", ")));

    if max_depth > 4 {
        check.deduct(30.0);
        check.issue(
            Severity::Warning,
            "structure_depth",
            format!("Some pages are {} clicks away from the home page", max_depth),
            "Keep important pages within four clicks of the home page",
        );
    }

    let deep = parsed.iter().filter(|p| p.depth >= 4).count();
    if ratio(deep, parsed.len()) > 0.3 {
        check.deduct(20.0);
        check.issue(
            Severity::Warning,
            "structure_deep_pages",
            format!(
                "{:.0}% of pages sit four or more levels deep",
                ratio(deep, parsed.len()) * 100.0
            ),
            "Flatten the navigation or add hub pages linking to deep content",
        );
    }

    let inlinks = site.graph.internal_inlink_counts();
    let orphans = parsed
        .iter()
        .filter(|p| p.depth > 0)
        .filter(|p| inlinks.get(&p.discovery_order).copied().unwrap_or(0) == 0)
        .count();
    let non_root = parsed.iter().filter(|p| p.depth > 0).count();
    if non_root > 0 && ratio(orphans, non_root) > 0.2 {
        check.deduct(15.0);
        check.detail(format!("{} pages have no internal inlinks", orphans));
        check.issue(
            Severity::Info,
            "structure_weak_linking",
            format!("{} pages receive no followed internal links", orphans),
            "Link to every page from at least one other page",
        );
    }

    check
}

/// Estimates LCP from fetch timings and body sizes
fn check_core_web_vitals(parsed: &[&PageRecord]) -> (CoreWebVitals, Check) {
    let timings: Vec<(u64, usize)> = parsed
        .iter()
        .filter_map(|p| p.meta.response_time_ms.map(|ms| (ms, p.meta.body_bytes)))
        .collect();

    if timings.is_empty() {
        let vitals = CoreWebVitals {
            estimated: true,
            source: "placeholder".to_string(),
            lcp_seconds: None,
            rating: VitalRating::NeedsImprovement,
            mean_response_ms: None,
            mean_body_kb: None,
        };
        let mut check = Check::scored(60.0);
        check.detail("no timing data; placeholder rating");
        check.issue(
            Severity::Info,
            "cwv_unmeasured",
            "Core Web Vitals could not be estimated",
            "Measure LCP, INP and CLS with a field-data or lab tool",
        );
        return (vitals, check);
    }

    let n = timings.len() as f64;
    let mean_ms = timings.iter().map(|(ms, _)| *ms as f64).sum::<f64>() / n;
    let mean_bytes = timings.iter().map(|(_, b)| *b as f64).sum::<f64>() / n;
    let lcp = mean_ms / 1000.0 + mean_bytes / ASSUMED_BYTES_PER_SEC + RENDER_ALLOWANCE_SECS;

    let (rating, score) = if lcp <= LCP_GOOD {
        (VitalRating::Good, 100.0)
    } else if lcp <= LCP_POOR {
        let span = (lcp - LCP_GOOD) / (LCP_POOR - LCP_GOOD);
        (VitalRating::NeedsImprovement, 100.0 - 50.0 * span)
    } else {
        (VitalRating::Poor, 30.0)
    };

    let vitals = CoreWebVitals {
        estimated: true,
        source: "fetch-timing".to_string(),
        lcp_seconds: Some(round2(lcp)),
        rating,
        mean_response_ms: Some(round2(mean_ms)),
        mean_body_kb: Some(round2(mean_bytes / 1024.0)),
    };

    let mut check = Check::scored(score);
    check.detail(format!(
        "estimated LCP {:.2}s from {} fetches (mean {:.0} ms, {:.1} KB)",
        lcp,
        timings.len(),
        mean_ms,
        mean_bytes / 1024.0
    ));
    match rating {
        VitalRating::Good => {}
        VitalRating::NeedsImprovement => check.issue(
            Severity::Warning,
            "cwv_lcp",
            format!("Estimated LCP is {:.2}s (target 2.5s)", lcp),
            "Reduce server response time and page weight",
        ),
        VitalRating::Poor => check.issue(
            Severity::Critical,
            "cwv_lcp",
            format!("Estimated LCP is {:.2}s, above the 4s poor threshold", lcp),
            "Cache responses, compress assets and cut blocking resources",
        ),
    }

    (vitals, check)
}

fn check_redirects(site: &SiteSnapshot<'_>, parsed: &[&PageRecord]) -> Check {
    let mut check = Check::new();
    let redirected: Vec<&&PageRecord> = parsed.iter().filter(|p| p.meta.redirected).collect();
    let loops = site
        .pages
        .iter()
        .filter(|p| p.status == PageStatus::Failed)
        .filter(|p| {
            p.error_reason
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains("redirect"))
        })
        .count();

    check.detail(format!(
        "{} of {} pages were reached through a redirect",
        redirected.len(),
        parsed.len()
    ));

    let share = ratio(redirected.len(), parsed.len());
    check.deduct((share * 100.0).min(50.0));
    if redirected.len() > 10 || share > 0.1 {
        check.issue(
            Severity::Warning,
            "redirects_many",
            format!("{} internal links lead through redirects", redirected.len()),
            "Point links directly at the final URL",
        );
    }

    if loops > 0 {
        check.deduct((loops as f64 * 10.0).min(40.0));
        check.detail(format!("{} redirect chains failed", loops));
        check.issue(
            Severity::Critical,
            "redirects_broken",
            format!("{} URLs end in a redirect loop or overly long chain", loops),
            "Fix redirect rules so every URL resolves in one hop",
        );
    }

    if let Some(root) = parsed.iter().find(|p| p.depth == 0 && p.meta.redirected) {
        if let Some(final_url) = &root.meta.final_url {
            check.detail(format!("home page redirects to {}", final_url));
            check.issue(
                Severity::Info,
                "redirects_root",
                format!("The home page redirects to {}", final_url),
                "Use the final address as the canonical site URL",
            );
        }
    }

    check
}

fn check_canonical(parsed: &[&PageRecord]) -> Check {
    let mut check = Check::new();
    if parsed.is_empty() {
        check.score = 0.0;
        return check;
    }

    let with_canonical: Vec<&&PageRecord> =
        parsed.iter().filter(|p| p.meta.canonical.is_some()).collect();
    let coverage = ratio(with_canonical.len(), parsed.len());
    check.score = coverage * 100.0;
    check.detail(format!(
        "{} of {} pages declare a canonical URL",
        with_canonical.len(),
        parsed.len()
    ));

    let missing = parsed.len() - with_canonical.len();
    if missing > 0 {
        let severity = if coverage < 0.5 {
            Severity::Warning
        } else {
            Severity::Info
        };
        check.issue(
            severity,
            "canonical_missing",
            format!("{} pages have no canonical tag", missing),
            "Add <link rel=\"canonical\"> to every indexable page",
        );
    }

    let mut foreign = 0;
    let mut elsewhere = 0;
    for page in &with_canonical {
        let Some(canonical) = page.meta.canonical.as_deref() else {
            continue;
        };
        let Ok(target) = normalize_url(canonical) else {
            continue;
        };
        let Ok(own) = normalize_url(&page.url) else {
            continue;
        };
        if target.host_str() != own.host_str() {
            foreign += 1;
        } else if target != own {
            elsewhere += 1;
        }
    }
    if elsewhere > 0 {
        check.detail(format!("{} pages canonicalise to another URL", elsewhere));
    }
    if foreign > 0 {
        check.deduct(20.0);
        check.issue(
            Severity::Warning,
            "canonical_cross_domain",
            format!("{} pages declare a canonical URL on another host", foreign),
            "Make sure cross-host canonicals are intentional",
        );
    }

    check
}

fn check_meta_tags(parsed: &[&PageRecord]) -> Check {
    let mut check = Check::new();
    if parsed.is_empty() {
        check.score = 0.0;
        return check;
    }

    let mut points = 0.0;
    let mut missing_title = 0;
    let mut bad_title = 0;
    let mut missing_description = 0;
    let mut bad_description = 0;
    let mut noindex = 0;
    let mut titles: HashMap<&str, usize> = HashMap::new();

    for page in parsed {
        match page.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => missing_title += 1,
            Some(title) => {
                *titles.entry(title).or_default() += 1;
                let len = title.chars().count();
                if (TITLE_RANGE.0..=TITLE_RANGE.1).contains(&len) {
                    points += 50.0;
                } else {
                    bad_title += 1;
                    points += 25.0;
                }
            }
        }
        match page
            .meta_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            None => missing_description += 1,
            Some(description) => {
                let len = description.chars().count();
                if (DESCRIPTION_RANGE.0..=DESCRIPTION_RANGE.1).contains(&len) {
                    points += 50.0;
                } else {
                    bad_description += 1;
                    points += 25.0;
                }
            }
        }
        if page
            .meta
            .meta_robots
            .as_deref()
            .is_some_and(|r| r.to_lowercase().contains("noindex"))
        {
            noindex += 1;
        }
    }

    let total = parsed.len();
    check.score = points / total as f64;
    check.detail(format!(
        "titles: {} missing, {} outside {}-{} chars",
        missing_title, bad_title, TITLE_RANGE.0, TITLE_RANGE.1
    ));
    check.detail(format!(
        "descriptions: {} missing, {} outside {}-{} chars",
        missing_description, bad_description, DESCRIPTION_RANGE.0, DESCRIPTION_RANGE.1
    ));

    if missing_title > 0 {
        check.issue(
            Severity::Critical,
            "meta_title_missing",
            format!("{} pages have no title", missing_title),
            "Give every page a unique, descriptive <title>",
        );
    }
    if ratio(bad_title, total) > 0.1 {
        check.issue(
            Severity::Warning,
            "meta_title_length",
            format!(
                "{} pages have titles outside {}-{} characters",
                bad_title, TITLE_RANGE.0, TITLE_RANGE.1
            ),
            "Keep titles between 30 and 60 characters",
        );
    }
    if missing_description > 0 {
        check.issue(
            Severity::Warning,
            "meta_description_missing",
            format!("{} pages have no meta description", missing_description),
            "Write a meta description summarising each page",
        );
    }
    if ratio(bad_description, total) > 0.1 {
        check.issue(
            Severity::Info,
            "meta_description_length",
            format!(
                "{} pages have descriptions outside {}-{} characters",
                bad_description, DESCRIPTION_RANGE.0, DESCRIPTION_RANGE.1
            ),
            "Keep meta descriptions between 70 and 160 characters",
        );
    }

    let duplicates = titles.values().filter(|&&n| n > 1).count();
    if duplicates > 0 {
        check.deduct(10.0);
        check.issue(
            Severity::Warning,
            "meta_title_duplicate",
            format!("{} titles are shared by several pages", duplicates),
            "Make each page title unique",
        );
    }
    if noindex > 0 {
        check.detail(format!("{} pages are marked noindex", noindex));
        check.issue(
            Severity::Warning,
            "meta_noindex",
            format!("{} crawled pages are marked noindex", noindex),
            "Remove noindex from pages that should appear in search results",
        );
    }

    check
}

fn check_structured_data(parsed: &[&PageRecord]) -> Check {
    let with_schema = parsed.iter().filter(|p| p.meta.has_structured_data).count();
    let root_has_schema = parsed
        .iter()
        .any(|p| p.depth == 0 && p.meta.has_structured_data);
    let coverage = ratio(with_schema, parsed.len());

    let mut check = Check::scored(coverage.min(0.5) * 2.0 * 70.0 + if root_has_schema { 30.0 } else { 0.0 });
    check.detail(format!(
        "{} of {} pages carry structured data",
        with_schema,
        parsed.len()
    ));

    if with_schema == 0 {
        check.issue(
            Severity::Warning,
            "structured_data_missing",
            "No structured data found on any page",
            "Add schema.org markup (JSON-LD) for your organisation and key content",
        );
    } else if !root_has_schema {
        check.issue(
            Severity::Info,
            "structured_data_home",
            "The home page has no structured data",
            "Describe the site or organisation with JSON-LD on the home page",
        );
    }

    check
}

fn check_links(site: &SiteSnapshot<'_>, parsed: &[&PageRecord]) -> Check {
    let mut check = Check::new();
    let status_by_order: HashMap<u32, PageStatus> = site
        .pages
        .iter()
        .map(|p| (p.discovery_order, p.status))
        .collect();

    let mut internal = 0usize;
    let mut external = 0usize;
    let mut broken = 0usize;
    for page in parsed {
        for edge in site.graph.outgoing(page.discovery_order) {
            if edge.is_internal {
                internal += 1;
                let failed = site
                    .graph
                    .target_of(edge)
                    .and_then(|t| status_by_order.get(&t))
                    .is_some_and(|s| *s == PageStatus::Failed);
                if failed {
                    broken += 1;
                }
            } else {
                external += 1;
            }
        }
    }

    let average = if parsed.is_empty() {
        0.0
    } else {
        internal as f64 / parsed.len() as f64
    };
    check.detail(format!(
        "{} internal and {} external links, {:.1} internal per page",
        internal, external, average
    ));

    if !parsed.is_empty() && average < 5.0 {
        check.deduct(20.0);
        check.issue(
            Severity::Info,
            "links_few_internal",
            format!("Pages average only {:.1} internal links", average),
            "Add contextual links between related pages",
        );
    }

    let external_share = ratio(external, internal + external);
    if external_share > 0.5 {
        check.deduct(15.0);
        check.issue(
            Severity::Info,
            "links_external_heavy",
            format!("{:.0}% of links point to other sites", external_share * 100.0),
            "Balance outbound links with links to your own content",
        );
    }

    if broken > 0 {
        check.deduct((broken as f64 * 10.0).min(40.0));
        check.detail(format!("{} internal links reach failing pages", broken));
        check.issue(
            Severity::Warning,
            "links_broken",
            format!("{} internal links point to pages that fail to load", broken),
            "Fix or remove links to broken pages",
        );
    }

    check
}

fn check_mobile(parsed: &[&PageRecord]) -> Check {
    let with_viewport: Vec<&&PageRecord> =
        parsed.iter().filter(|p| p.meta.viewport.is_some()).collect();
    let coverage = ratio(with_viewport.len(), parsed.len());
    let mut check = Check::scored(coverage * 100.0);
    check.detail(format!(
        "{} of {} pages declare a viewport",
        with_viewport.len(),
        parsed.len()
    ));

    if parsed.iter().any(|p| p.depth == 0 && p.meta.viewport.is_none()) {
        check.issue(
            Severity::Critical,
            "mobile_viewport_home",
            "The home page has no viewport meta tag",
            "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
        );
    } else if with_viewport.len() < parsed.len() {
        check.issue(
            Severity::Warning,
            "mobile_viewport",
            format!(
                "{} pages have no viewport meta tag",
                parsed.len() - with_viewport.len()
            ),
            "Declare a responsive viewport on every page",
        );
    }

    let fixed_width = with_viewport
        .iter()
        .filter(|p| {
            p.meta
                .viewport
                .as_deref()
                .is_some_and(|v| !v.contains("device-width"))
        })
        .count();
    if fixed_width > 0 {
        check.deduct(10.0);
        check.issue(
            Severity::Info,
            "mobile_viewport_width",
            format!("{} viewports do not use width=device-width", fixed_width),
            "Use width=device-width so layouts adapt to the screen",
        );
    }

    check
}

fn check_https(site: &SiteSnapshot<'_>) -> Check {
    let final_url = site.signals.root_final_url.as_deref();
    let served_https = final_url
        .map(|u| u.starts_with("https://"))
        .unwrap_or(site.root.scheme() == "https");

    if !served_https {
        let mut check = Check::scored(0.0);
        check.detail("site is served over plain HTTP");
        check.issue(
            Severity::Critical,
            "https_missing",
            "The site is served over plain HTTP",
            "Serve the site over HTTPS and redirect HTTP to it",
        );
        return check;
    }

    let mut check = Check::new();
    check.detail("site is served over HTTPS");

    if site.root.scheme() == "http" {
        check.deduct(20.0);
        check.issue(
            Severity::Info,
            "https_redirect",
            "The audited HTTP address redirects to HTTPS",
            "Link to the HTTPS address directly",
        );
    }

    let plain_http = site
        .pages
        .iter()
        .filter(|p| p.is_parsed() && p.url.starts_with("http://"))
        .count();
    if plain_http > 0 {
        check.deduct(20.0);
        check.issue(
            Severity::Warning,
            "https_mixed",
            format!("{} internal pages are linked over plain HTTP", plain_http),
            "Update internal links to use HTTPS",
        );
    }

    let hsts = site.signals.root_headers.contains_key("strict-transport-security");
    if !hsts {
        check.deduct(10.0);
        check.detail("no Strict-Transport-Security header");
        check.issue(
            Severity::Info,
            "https_hsts",
            "The home page sends no HSTS header",
            "Send Strict-Transport-Security to keep browsers on HTTPS",
        );
    }

    check
}
