//! HTML parser for extracting links and SEO metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links with anchor text and `rel="nofollow"`
//! - Title, meta description, canonical, robots and viewport tags
//! - Headings, images, Open Graph and Twitter card tags
//! - Visible body text

use crate::storage::{Heading, ImageRef, PageMeta};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Elements whose text never counts as visible content
const NON_VISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "head", "template"];

/// A hyperlink found in a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Absolute URL (not yet normalized)
    pub url: String,
    /// Visible anchor text, whitespace collapsed
    pub anchor_text: String,
    /// `rel="nofollow"` present
    pub nofollow: bool,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// The `<meta name="description">` content
    pub meta_description: Option<String>,

    /// Visible body text
    pub text: String,

    /// All links found on the page (absolute URLs)
    pub links: Vec<ExtractedLink>,

    /// Everything else the analyzers look at
    pub meta: PageMeta,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// `rel="nofollow"` links are returned with `nofollow` set; the crawler
/// records them but does not traverse them.
///
/// # Errors
///
/// Returns an error message for an empty document.
///
/// # Example
///
/// ```
/// use seo_audit::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url).unwrap();
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> Result<ParsedPage, String> {
    if html.trim().is_empty() {
        return Err("empty document".to_string());
    }

    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let meta_tags = extract_meta_tags(&document);
    let links = extract_links(&document, base_url);
    let text = extract_text(&document);

    let meta = PageMeta {
        canonical: extract_canonical(&document, base_url),
        meta_robots: meta_tags.named.get("robots").cloned(),
        viewport: meta_tags.named.get("viewport").cloned(),
        lang: extract_lang(&document),
        headings: extract_headings(&document),
        images: extract_images(&document),
        open_graph: meta_tags.open_graph,
        twitter: meta_tags.twitter,
        has_structured_data: has_structured_data(&document),
        ..Default::default()
    };

    Ok(ParsedPage {
        title,
        meta_description: meta_tags.named.get("description").cloned(),
        text,
        links,
        meta,
    })
}

/// Collapses runs of whitespace into single spaces
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element_text(&element))
        .filter(|s| !s.is_empty())
}

#[derive(Default)]
struct MetaTags {
    /// `name=` meta tags, names lowercased (description, robots, viewport, ...)
    named: BTreeMap<String, String>,
    open_graph: BTreeMap<String, String>,
    twitter: BTreeMap<String, String>,
}

fn extract_meta_tags(document: &Html) -> MetaTags {
    let mut tags = MetaTags::default();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return tags;
    };

    for element in document.select(&selector) {
        let el = element.value();
        let Some(content) = el.attr("content").map(|c| c.trim().to_string()) else {
            continue;
        };
        let key = el
            .attr("property")
            .or_else(|| el.attr("name"))
            .map(|k| k.trim().to_lowercase());
        let Some(key) = key else {
            continue;
        };

        // First occurrence wins, like browsers and crawlers do
        if let Some(og) = key.strip_prefix("og:") {
            tags.open_graph.entry(og.to_string()).or_insert(content);
        } else if let Some(tw) = key.strip_prefix("twitter:") {
            tags.twitter.entry(tw.to_string()).or_insert(content);
        } else if !content.is_empty() {
            tags.named.entry(key).or_insert(content);
        }
    }

    tags
}

fn extract_canonical(document: &Html, base_url: &Url) -> Option<String> {
    let selector = Selector::parse("link[rel][href]").ok()?;
    document
        .select(&selector)
        .find(|el| {
            el.value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")))
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_link(href, base_url))
}

fn extract_lang(document: &Html) -> Option<String> {
    let selector = Selector::parse("html[lang]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let level = element.value().name()[1..].parse::<u8>().ok()?;
            Some(Heading {
                level,
                text: element_text(&element),
            })
        })
        .collect()
}

fn extract_images(document: &Html) -> Vec<ImageRef> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| ImageRef {
            src: element.value().attr("src").unwrap_or("").trim().to_string(),
            alt: element.value().attr("alt").map(|a| a.trim().to_string()),
        })
        .collect()
}

fn has_structured_data(document: &Html) -> bool {
    ["script[type='application/ld+json']", "[itemscope]"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .any(|selector| document.select(&selector).next().is_some())
}

/// Extracts visible text, skipping scripts, styles and the document head
fn extract_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| NON_VISIBLE_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.extend(text.split_whitespace());
        }
    }

    parts.join(" ")
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<ExtractedLink> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(absolute_url) = resolve_link(href, base_url) else {
                continue;
            };

            let nofollow = element
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("nofollow")))
                .unwrap_or(false);

            links.push(ExtractedLink {
                url: absolute_url,
                anchor_text: element_text(&element),
                nofollow,
            });
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn parse(html: &str) -> ParsedPage {
        parse_html(html, &base_url()).unwrap()
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let parsed = parse(r#"<html><head><title>  Test   Page  </title></head><body></body></html>"#);
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let parsed = parse(r#"<html><head></head><body></body></html>"#);
        assert_eq!(parsed.title, None);
        assert!(parsed.text.is_empty());
    }

    #[test]
    fn test_empty_document_is_an_error() {
        assert!(parse_html("   ", &base_url()).is_err());
    }

    #[test]
    fn test_meta_tags() {
        let parsed = parse(
            r#"<html lang="ko"><head>
                <meta name="Description" content="A page about things">
                <meta name="robots" content="noindex, nofollow">
                <meta name="viewport" content="width=device-width, initial-scale=1">
                <meta property="og:title" content="OG Title">
                <meta name="twitter:card" content="summary">
                <link rel="canonical" href="/canonical">
            </head><body></body></html>"#,
        );

        assert_eq!(parsed.meta_description.as_deref(), Some("A page about things"));
        assert_eq!(parsed.meta.meta_robots.as_deref(), Some("noindex, nofollow"));
        assert!(parsed.meta.viewport.is_some());
        assert_eq!(parsed.meta.lang.as_deref(), Some("ko"));
        assert_eq!(parsed.meta.open_graph.get("title").map(String::as_str), Some("OG Title"));
        assert_eq!(parsed.meta.twitter.get("card").map(String::as_str), Some("summary"));
        assert_eq!(
            parsed.meta.canonical.as_deref(),
            Some("https://example.com/canonical")
        );
    }

    #[test]
    fn test_headings_and_images() {
        let parsed = parse(
            r#"<html><body>
                <h1>Main</h1><h3>Skipped level</h3>
                <img src="/a.png" alt="A"><img src="/b.png"><img src="/c.png" alt="">
            </body></html>"#,
        );

        let levels: Vec<u8> = parsed.meta.headings.iter().map(|h| h.level).collect();
        assert_eq!(levels, vec![1, 3]);
        assert_eq!(parsed.meta.images.len(), 3);
        assert_eq!(parsed.meta.images[0].alt.as_deref(), Some("A"));
        assert_eq!(parsed.meta.images[1].alt, None);
        assert_eq!(parsed.meta.images[2].alt.as_deref(), Some(""));
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let parsed = parse(
            r#"<html><head><title>T</title><style>.a{}</style></head>
               <body><p>Hello   <b>world</b></p><script>var x = 1;</script>
               <noscript>enable js</noscript></body></html>"#,
        );
        assert_eq!(parsed.text, "Hello world");
    }

    #[test]
    fn test_structured_data_detection() {
        let with_ld = parse(
            r#"<html><head><script type="application/ld+json">{"@type":"Organization"}</script></head><body></body></html>"#,
        );
        assert!(with_ld.meta.has_structured_data);

        let with_microdata = parse(r#"<html><body><div itemscope itemtype="https://schema.org/Product"></div></body></html>"#);
        assert!(with_microdata.meta.has_structured_data);

        assert!(!parse("<html><body>plain</body></html>").meta.has_structured_data);
    }

    #[test]
    fn test_links_with_anchor_and_nofollow() {
        let parsed = parse(
            r#"<html><body>
                <a href="/a"> First   link </a>
                <a href="https://other.com/" rel="external nofollow">Other</a>
            </body></html>"#,
        );

        assert_eq!(parsed.links.len(), 2);
        assert_eq!(parsed.links[0].url, "https://example.com/a");
        assert_eq!(parsed.links[0].anchor_text, "First link");
        assert!(!parsed.links[0].nofollow);
        assert!(parsed.links[1].nofollow);
    }

    #[test]
    fn test_skip_special_links() {
        let parsed = parse(
            r##"<html><body>
                <a href="javascript:void(0)">JS</a>
                <a href="MAILTO:test@example.com">Email</a>
                <a href="tel:+1234567890">Phone</a>
                <a href="#section">Anchor</a>
                <a href="/file.pdf" download>Download</a>
                <a href="ftp://example.com/file">FTP</a>
                <a href="/valid">Valid</a>
            </body></html>"##,
        );

        assert_eq!(parsed.links.len(), 1);
        assert_eq!(parsed.links[0].url, "https://example.com/valid");
    }
}
