//! On-page checks for ranked pages
//!
//! Each page earns points from eight checks (title 15, meta description 15,
//! URL 10, headings 15, images 10, social tags 10, content 15, links 10),
//! capped at 100. Every shortfall comes with an issue.

use crate::analysis::{
    ratio, round2, Analyzer, Issue, IssueCategory, PartialResult, PartialResults, RankedPage,
    Severity, SiteSnapshot, TextReport,
};
use crate::storage::PageRecord;
use crate::{AuditError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static STOP_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9/\-.~]").expect("stop character pattern"));

const MAX_URL_LENGTH: usize = 100;
const MIN_INTERNAL_LINKS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckScore {
    pub name: String,
    pub points: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnPageResult {
    pub rank: usize,
    pub page_id: i64,
    pub url: String,
    pub score: f64,
    pub primary_keyword: Option<String>,
    pub checks: Vec<CheckScore>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnPageReport {
    pub pages: Vec<OnPageResult>,
    /// Mean over ranked pages; 0 when nothing was ranked
    pub average_score: f64,
}

/// Accumulates one page's points and issues
struct PageCheck<'a> {
    url: &'a str,
    checks: Vec<CheckScore>,
    issues: Vec<Issue>,
}

impl<'a> PageCheck<'a> {
    fn score(&mut self, name: &str, points: f64, max: f64) {
        self.checks.push(CheckScore {
            name: name.to_string(),
            points: points.clamp(0.0, max),
            max,
        });
    }

    fn issue(&mut self, severity: Severity, check: &str, message: String, recommendation: &str) {
        self.issues.push(
            Issue::new(severity, IssueCategory::OnPage, check, message)
                .on_page(self.url)
                .recommend(recommendation),
        );
    }
}

fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    haystack.to_lowercase().contains(&keyword.to_lowercase())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OnPageAnalyzer;

impl Analyzer for OnPageAnalyzer {
    fn name(&self) -> &'static str {
        "on_page"
    }

    fn analyze(&self, site: &SiteSnapshot<'_>, prior: &PartialResults) -> Result<PartialResult> {
        let ranking = prior.ranking.as_ref().ok_or_else(|| {
            AuditError::InvalidInput("on-page analysis needs a page ranking".to_string())
        })?;
        Ok(PartialResult::OnPage(self.run(
            site,
            &ranking.pages,
            prior.text.as_ref(),
        )))
    }
}

impl OnPageAnalyzer {
    /// Checks the ranked pages only
    pub fn run(
        &self,
        site: &SiteSnapshot<'_>,
        ranked: &[RankedPage],
        text: Option<&TextReport>,
    ) -> OnPageReport {
        let pages: Vec<OnPageResult> = ranked
            .iter()
            .filter_map(|entry| {
                let page = site.pages.iter().find(|p| p.id == entry.page_id)?;
                let primary = text
                    .and_then(|t| t.page(page.id))
                    .and_then(|t| t.primary_keyword());
                Some(self.check_page(site, entry.rank, page, primary))
            })
            .collect();

        let average_score = if pages.is_empty() {
            0.0
        } else {
            round2(pages.iter().map(|p| p.score).sum::<f64>() / pages.len() as f64)
        };

        OnPageReport {
            pages,
            average_score,
        }
    }

    pub fn check_page(
        &self,
        site: &SiteSnapshot<'_>,
        rank: usize,
        page: &PageRecord,
        primary: Option<&str>,
    ) -> OnPageResult {
        let mut check = PageCheck {
            url: &page.url,
            checks: Vec::with_capacity(8),
            issues: Vec::new(),
        };

        check_title(&mut check, page, primary);
        check_description(&mut check, page, primary);
        check_url(&mut check, page, primary);
        check_headings(&mut check, page, primary);
        check_images(&mut check, page);
        check_social(&mut check, page);
        check_content(&mut check, page);
        check_links(&mut check, site, page);

        let score = round2(check.checks.iter().map(|c| c.points).sum::<f64>().min(100.0));
        OnPageResult {
            rank,
            page_id: page.id,
            url: page.url.clone(),
            score,
            primary_keyword: primary.map(str::to_string),
            checks: check.checks,
            issues: check.issues,
        }
    }
}

fn check_title(check: &mut PageCheck<'_>, page: &PageRecord, primary: Option<&str>) {
    let Some(title) = page.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        check.issue(
            Severity::Critical,
            "title_missing",
            "Page has no title".to_string(),
            "Add a descriptive <title> that includes the page's main keyword",
        );
        check.score("title", 0.0, 15.0);
        return;
    };

    let len = title.chars().count();
    let mut points = if len < 30 {
        check.issue(
            Severity::Warning,
            "title_length",
            format!("Title is shorter than 30 characters ({})", len),
            "Expand the title to 30-60 characters",
        );
        5.0
    } else if len > 60 {
        check.issue(
            Severity::Warning,
            "title_length",
            format!("Title exceeds 60 characters ({})", len),
            "Shorten the title so it is not truncated in search results",
        );
        5.0
    } else {
        10.0
    };

    if let Some(keyword) = primary {
        if contains_keyword(title, keyword) {
            points += 5.0;
        } else {
            check.issue(
                Severity::Info,
                "title_keyword",
                format!("Title does not contain the primary keyword \"{}\"", keyword),
                "Work the page's main keyword into the title",
            );
        }
    }
    check.score("title", points, 15.0);
}

fn check_description(check: &mut PageCheck<'_>, page: &PageRecord, primary: Option<&str>) {
    let Some(description) = page
        .meta_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    else {
        check.issue(
            Severity::Warning,
            "description_missing",
            "Page has no meta description".to_string(),
            "Write a 70-160 character summary of the page",
        );
        check.score("meta_description", 0.0, 15.0);
        return;
    };

    let len = description.chars().count();
    let mut points = if len < 70 {
        check.issue(
            Severity::Warning,
            "description_length",
            format!("Meta description is shorter than 70 characters ({})", len),
            "Expand the description to 70-160 characters",
        );
        5.0
    } else if len > 160 {
        check.issue(
            Severity::Warning,
            "description_length",
            format!("Meta description exceeds 160 characters ({})", len),
            "Trim the description so it is not truncated",
        );
        5.0
    } else {
        10.0
    };

    if let Some(keyword) = primary {
        if contains_keyword(description, keyword) {
            points += 5.0;
        } else {
            check.issue(
                Severity::Info,
                "description_keyword",
                format!(
                    "Meta description does not contain the primary keyword \"{}\"",
                    keyword
                ),
                "Mention the page's main keyword in the description",
            );
        }
    }
    check.score("meta_description", points, 15.0);
}

fn check_url(check: &mut PageCheck<'_>, page: &PageRecord, primary: Option<&str>) {
    let Ok(url) = Url::parse(&page.url) else {
        check.score("url", 0.0, 10.0);
        return;
    };
    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut points = 0.0;
    let len = path.chars().count();
    if len > MAX_URL_LENGTH {
        check.issue(
            Severity::Warning,
            "url_length",
            format!("URL path is longer than {} characters ({})", MAX_URL_LENGTH, len),
            "Use short, descriptive URLs",
        );
    } else {
        points += 4.0;
    }

    let stops: HashSet<char> = STOP_CHARACTERS
        .find_iter(&path)
        .filter_map(|m| m.as_str().chars().next())
        .collect();
    if stops.is_empty() {
        points += 3.0;
    } else {
        let mut shown: Vec<String> = stops.iter().map(|c| format!("'{}'", c)).collect();
        shown.sort();
        check.issue(
            Severity::Info,
            "url_characters",
            format!("URL contains special characters: {}", shown.join(" ")),
            "Use lowercase words separated by hyphens",
        );
    }

    // The home page path carries no keyword
    if url.path() == "/" {
        points += 3.0;
    } else if let Some(keyword) = primary {
        if contains_keyword(&path, keyword) {
            points += 3.0;
        }
    }
    check.score("url", points, 10.0);
}

fn check_headings(check: &mut PageCheck<'_>, page: &PageRecord, primary: Option<&str>) {
    let h1s: Vec<&str> = page.meta.h1s().map(|h| h.text.trim()).collect();
    let mut points = 0.0;

    match h1s.len() {
        0 => {
            check.issue(
                Severity::Critical,
                "h1_missing",
                "Page has no H1 heading".to_string(),
                "Add exactly one H1 that states the page topic",
            );
        }
        1 => points += 5.0,
        n => {
            points += 2.0;
            check.issue(
                Severity::Warning,
                "h1_multiple",
                format!("Page has {} H1 headings; use exactly one", n),
                "Keep a single H1 and demote the others to H2",
            );
        }
    }

    if let Some(h1) = h1s.first() {
        let len = h1.chars().count();
        if h1.is_empty() {
            check.issue(
                Severity::Warning,
                "h1_empty",
                "The H1 heading is empty".to_string(),
                "Give the H1 visible text",
            );
        } else if (20..=70).contains(&len) {
            points += 3.0;
        } else {
            check.issue(
                Severity::Info,
                "h1_length",
                format!("H1 is {} characters; aim for 20-70", len),
                "Make the H1 descriptive but concise",
            );
        }

        if let Some(keyword) = primary {
            if contains_keyword(h1, keyword) {
                points += 3.0;
            } else {
                check.issue(
                    Severity::Info,
                    "h1_keyword",
                    format!("H1 does not contain the primary keyword \"{}\"", keyword),
                    "Include the page's main keyword in the H1",
                );
            }
        }
    }

    let mut previous = 0u8;
    let mut skip = None;
    for heading in &page.meta.headings {
        if previous > 0 && heading.level > previous + 1 {
            skip = Some((previous, heading.level));
            break;
        }
        previous = heading.level;
    }
    match skip {
        Some((from, to)) => check.issue(
            Severity::Warning,
            "heading_hierarchy",
            format!("Heading levels skip from H{} to H{}", from, to),
            "Nest headings in order without skipping levels",
        ),
        None => points += 4.0,
    }

    check.score("headings", points, 15.0);
}

fn check_images(check: &mut PageCheck<'_>, page: &PageRecord) {
    let images = &page.meta.images;
    if images.is_empty() {
        check.score("images", 10.0, 10.0);
        return;
    }

    let with_alt = images.iter().filter(|i| i.alt.is_some()).count();
    let coverage = ratio(with_alt, images.len());
    if with_alt < images.len() {
        let severity = if coverage < 0.5 {
            Severity::Warning
        } else {
            Severity::Info
        };
        check.issue(
            severity,
            "image_alt",
            format!(
                "{} of {} images lack alt text ({:.0}% coverage)",
                images.len() - with_alt,
                images.len(),
                coverage * 100.0
            ),
            "Describe every meaningful image with an alt attribute",
        );
    }
    check.score("images", 10.0 * coverage, 10.0);
}

fn check_social(check: &mut PageCheck<'_>, page: &PageRecord) {
    let og = &page.meta.open_graph;
    let parts: [(&str, bool, f64); 4] = [
        ("og:title", og.contains_key("og:title"), 3.0),
        ("og:description", og.contains_key("og:description"), 2.0),
        ("og:image", og.contains_key("og:image"), 3.0),
        (
            "twitter:card",
            page.meta.twitter.contains_key("twitter:card"),
            2.0,
        ),
    ];

    let points: f64 = parts.iter().filter(|p| p.1).map(|p| p.2).sum();
    let missing: Vec<&str> = parts.iter().filter(|p| !p.1).map(|p| p.0).collect();
    if missing.len() == parts.len() {
        check.issue(
            Severity::Warning,
            "social_missing",
            "Page has no Open Graph or Twitter Card tags".to_string(),
            "Add og:title, og:description, og:image and twitter:card for link previews",
        );
    } else if !missing.is_empty() {
        check.issue(
            Severity::Info,
            "social_incomplete",
            format!("Social tags missing: {}", missing.join(", ")),
            "Complete the Open Graph and Twitter Card tags",
        );
    }
    check.score("social_tags", points, 10.0);
}

fn check_content(check: &mut PageCheck<'_>, page: &PageRecord) {
    let words = page.text.split_whitespace().count();
    let points = match words {
        n if n >= 300 => 15.0,
        n if n >= 150 => 10.0,
        n if n >= 50 => 5.0,
        _ => 0.0,
    };

    if words == 0 {
        check.issue(
            Severity::Warning,
            "content_empty",
            "Page has no visible text".to_string(),
            "Add text content; search engines cannot index what they cannot read",
        );
    } else if words < 150 {
        check.issue(
            Severity::Warning,
            "content_thin",
            format!("Thin content ({} words)", words),
            "Expand the page to at least 300 words of useful text",
        );
    }
    check.score("content", points, 15.0);
}

fn check_links(check: &mut PageCheck<'_>, site: &SiteSnapshot<'_>, page: &PageRecord) {
    let edges = site.graph.outgoing(page.discovery_order);
    let internal: HashSet<&str> = edges
        .iter()
        .filter(|e| e.is_internal && e.target_url != page.url)
        .map(|e| e.target_url.as_str())
        .collect();
    let empty_anchors = edges
        .iter()
        .filter(|e| e.anchor_text.trim().is_empty())
        .count();

    let mut points = (internal.len().min(MIN_INTERNAL_LINKS) * 2) as f64;
    if internal.len() < MIN_INTERNAL_LINKS {
        check.issue(
            Severity::Warning,
            "links_internal",
            format!("Page has only {} internal links", internal.len()),
            "Link to at least three related pages on your site",
        );
    }

    if edges.is_empty() {
        points += 4.0;
    } else {
        points += 4.0 * (1.0 - ratio(empty_anchors, edges.len()));
        if empty_anchors > 0 {
            check.issue(
                Severity::Info,
                "links_empty_anchor",
                format!("{} links have empty anchor text", empty_anchors),
                "Give every link descriptive anchor text",
            );
        }
    }
    check.score("links", points, 10.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::SiteFixture;
    use crate::crawler::LinkEdge;
    use crate::storage::{Heading, ImageRef};

    fn result_for(site: &SiteFixture, index: usize, primary: Option<&str>) -> OnPageResult {
        OnPageAnalyzer.check_page(&site.snapshot(), 1, &site.pages[index], primary)
    }

    fn points(result: &OnPageResult, name: &str) -> f64 {
        result
            .checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.points)
            .unwrap()
    }

    fn has_issue(result: &OnPageResult, check: &str) -> bool {
        result.issues.iter().any(|i| i.check == check)
    }

    #[test]
    fn test_long_title_is_reported() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/", 0, "").title = Some("x".repeat(75));
        let result = result_for(&site, 0, None);
        let issue = result
            .issues
            .iter()
            .find(|i| i.check == "title_length")
            .unwrap();
        assert_eq!(issue.message, "Title exceeds 60 characters (75)");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(points(&result, "title"), 5.0);
    }

    #[test]
    fn test_primary_keyword_checks() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/rust-guide", 1, "");
        let result = result_for(&site, 0, Some("rust"));
        assert!(has_issue(&result, "title_keyword"));
        assert!(has_issue(&result, "description_keyword"));
        assert!(has_issue(&result, "h1_keyword"));
        assert_eq!(result.primary_keyword.as_deref(), Some("rust"));
        assert_eq!(points(&result, "url"), 10.0);
    }

    #[test]
    fn test_heading_problems() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/", 0, "").meta.headings = vec![
            Heading { level: 1, text: "First main heading of page".to_string() },
            Heading { level: 1, text: "Second".to_string() },
            Heading { level: 3, text: "Skipped".to_string() },
        ];
        let result = result_for(&site, 0, None);
        assert!(has_issue(&result, "h1_multiple"));
        assert!(has_issue(&result, "heading_hierarchy"));

        site.pages[0].meta.headings.clear();
        let result = result_for(&site, 0, None);
        assert!(result
            .issues
            .iter()
            .any(|i| i.check == "h1_missing" && i.severity == Severity::Critical));
    }

    #[test]
    fn test_alt_coverage() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/", 0, "").meta.images = vec![
            ImageRef { src: "a.png".to_string(), alt: Some("A".to_string()) },
            ImageRef { src: "b.png".to_string(), alt: None },
            ImageRef { src: "c.png".to_string(), alt: Some(String::new()) },
            ImageRef { src: "d.png".to_string(), alt: None },
        ];
        let result = result_for(&site, 0, None);
        assert_eq!(points(&result, "images"), 5.0);
        assert!(has_issue(&result, "image_alt"));
    }

    #[test]
    fn test_url_stop_characters() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/My_Page?id=3", 1, "");
        let result = result_for(&site, 0, None);
        assert!(has_issue(&result, "url_characters"));
        assert_eq!(points(&result, "url"), 4.0);
    }

    #[test]
    fn test_empty_page_still_scored() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/", 0, "");
        let result = result_for(&site, 0, None);
        assert!(has_issue(&result, "content_empty"));
        assert!(has_issue(&result, "links_internal"));
        assert_eq!(points(&result, "content"), 0.0);
        assert!((0.0..=100.0).contains(&result.score));
    }

    #[test]
    fn test_links_and_anchors() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/", 0, "");
        for path in ["/a", "/b", "/c"] {
            site.page(path, 1, "");
        }
        site.link(0, 1);
        site.link(0, 2);
        site.link(0, 3);
        site.graph.add_edge(
            0,
            LinkEdge {
                target_url: "https://other.org/".to_string(),
                anchor_text: " ".to_string(),
                is_internal: false,
                nofollow: false,
            },
        );
        let result = result_for(&site, 0, None);
        assert!(!has_issue(&result, "links_internal"));
        assert!(has_issue(&result, "links_empty_anchor"));
        assert_eq!(points(&result, "links"), 9.0);
    }

    #[test]
    fn test_only_ranked_pages_are_checked() {
        let mut site = SiteFixture::new("https://example.com/");
        site.page("/", 0, "");
        site.page("/a", 1, "");
        let ranked = vec![RankedPage {
            rank: 1,
            page_id: site.pages[1].id,
            url: site.pages[1].url.clone(),
            title: None,
            depth: 1,
            discovery_order: 1,
            inlinks: 0,
            score: 1.0,
            breakdown: Default::default(),
        }];
        let report = OnPageAnalyzer.run(&site.snapshot(), &ranked, None);
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.pages[0].url, "https://example.com/a");
        assert_eq!(report.average_score, report.pages[0].score);
    }
}
