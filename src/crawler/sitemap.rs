//! XML sitemap parsing
//!
//! Sitemaps are read with a few regular expressions rather than a full XML
//! parser; only `<loc>` and `<lastmod>` matter to the audit.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Upper bound on entries kept from one sitemap
pub const MAX_SITEMAP_ENTRIES: usize = 50_000;

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(url|sitemap)\b[^>]*>(.*?)</(?:url|sitemap)\s*>")
        .expect("sitemap entry pattern")
});

static LOC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc\s*>\s*(.*?)\s*</loc\s*>").expect("loc pattern"));

static LASTMOD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<lastmod\s*>\s*(.*?)\s*</lastmod\s*>").expect("lastmod pattern")
});

static ROOT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(urlset|sitemapindex)\b").expect("sitemap root pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SitemapKind {
    UrlSet,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSitemap {
    pub kind: SitemapKind,
    pub entries: Vec<SitemapEntry>,
}

/// What the crawl learned about the site's sitemap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapSnapshot {
    /// The sitemap URL that was tried first
    pub url: Option<String>,
    /// Whether the URL came from a robots.txt `Sitemap:` directive
    pub declared_in_robots: bool,
    /// A 2xx response was received
    pub found: bool,
    /// The body was a `<urlset>` or `<sitemapindex>`
    pub valid: bool,
    /// Page entries, with index children expanded
    pub entries: Vec<SitemapEntry>,
    pub error: Option<String>,
}

impl SitemapSnapshot {
    /// Share of entries carrying a `<lastmod>`, 0 when there are none
    pub fn lastmod_ratio(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let with_lastmod = self.entries.iter().filter(|e| e.lastmod.is_some()).count();
        with_lastmod as f64 / self.entries.len() as f64
    }
}

fn unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

fn strip_cdata(s: &str) -> &str {
    s.strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
        .unwrap_or(s)
        .trim()
}

/// Parses a sitemap or sitemap index
///
/// Returns None when the document is neither.
pub fn parse_sitemap(xml: &str) -> Option<ParsedSitemap> {
    let root = ROOT_PATTERN.captures(xml)?;
    let kind = if root[1].eq_ignore_ascii_case("sitemapindex") {
        SitemapKind::Index
    } else {
        SitemapKind::UrlSet
    };

    let entries = ENTRY_PATTERN
        .captures_iter(xml)
        .filter_map(|caps| {
            let body = caps.get(2)?.as_str();
            let loc = LOC_PATTERN.captures(body)?;
            let loc = unescape(strip_cdata(loc.get(1)?.as_str()));
            if loc.is_empty() {
                return None;
            }
            let lastmod = LASTMOD_PATTERN
                .captures(body)
                .and_then(|m| m.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|m| !m.is_empty());
            Some(SitemapEntry { loc, lastmod })
        })
        .take(MAX_SITEMAP_ENTRIES)
        .collect();

    Some(ParsedSitemap { kind, entries })
}
