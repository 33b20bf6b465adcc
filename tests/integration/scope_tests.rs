//! Site boundary scenarios: subdomains, external links and robots-gated sitemaps

use crate::support::{auditor_with, fast_config, page, ScriptedSite, PROSE, ROOT};
use seo_audit::crawler::REASON_ROBOTS_DISALLOWED;
use seo_audit::{AuditRequest, AuditStatus, PageStatus, SubdomainPolicy};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BLOG_POST: &str = "https://blog.site.test/post";
const BLOG_SECOND: &str = "https://blog.site.test/second";
const EXTERNAL: &str = "https://other.test/page";

/// A root host linking to a blog subdomain and an external site
fn two_host_site() -> ScriptedSite {
    ScriptedSite::new()
        .text("/robots.txt", 200, "User-agent: *\nAllow: /\n")
        .text(
            "https://blog.site.test/robots.txt",
            200,
            "User-agent: *\nAllow: /\n",
        )
        .html("/", page("Home", PROSE, &[BLOG_POST, EXTERNAL, "/about"]))
        .html("/about", page("About", PROSE, &[ROOT]))
        .html(BLOG_POST, page("Post", PROSE, &[BLOG_SECOND, EXTERNAL]))
        .html(BLOG_SECOND, page("Second", PROSE, &[ROOT]))
        .html(EXTERNAL, page("Elsewhere", PROSE, &[]))
}

#[tokio::test]
async fn test_subdomains_are_crawled_under_internal_policy() {
    let db = TempDir::new().unwrap();
    let mut config = fast_config(&db);
    config.crawler.subdomain_policy = SubdomainPolicy::Internal;
    let site = Arc::new(two_host_site());
    let (auditor, storage) = auditor_with(config, site.clone());

    let result = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap()
        .result;
    assert_eq!(result.status, AuditStatus::Success);

    let storage = storage.lock().unwrap();
    let pages = storage.get_pages(result.website.id).unwrap();
    for url in [BLOG_POST, BLOG_SECOND] {
        let page = pages.iter().find(|p| p.url == url).expect("blog page stored");
        assert_eq!(page.status, PageStatus::Parsed);
    }
    assert!(pages.iter().all(|p| p.url != EXTERNAL));

    // One robots.txt per origin, however many of its pages were crawled
    assert_eq!(site.fetches_of("/robots.txt"), 1);
    assert_eq!(site.fetches_of("https://blog.site.test/robots.txt"), 1);
    assert_eq!(site.fetches_of(EXTERNAL), 0);
    assert_eq!(site.fetches_of("https://other.test/robots.txt"), 0);

    let root_id = pages.iter().find(|p| p.url == ROOT).unwrap().id;
    let links = storage.get_links(result.website.id).unwrap();
    let from_root = |target: &str| {
        links
            .iter()
            .find(|l| l.source_page_id == root_id && l.link.target_url == target)
            .unwrap_or_else(|| panic!("no link row to {}", target))
    };
    assert!(from_root(BLOG_POST).link.is_internal);
    assert!(!from_root(EXTERNAL).link.is_internal);
    // The blog post's external link is stored too
    assert!(links
        .iter()
        .any(|l| l.source_page_id != root_id && l.link.target_url == EXTERNAL));
}

#[tokio::test]
async fn test_subdomains_are_external_under_host_only_policy() {
    let db = TempDir::new().unwrap();
    let mut config = fast_config(&db);
    config.crawler.subdomain_policy = SubdomainPolicy::HostOnly;
    let site = Arc::new(two_host_site());
    let (auditor, storage) = auditor_with(config, site.clone());

    let result = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap()
        .result;
    assert_eq!(result.crawl.parsed, 2);

    let storage = storage.lock().unwrap();
    let pages = storage.get_pages(result.website.id).unwrap();
    assert!(pages.iter().all(|p| !p.url.contains("blog.site.test")));
    assert_eq!(site.fetches_of(BLOG_POST), 0);
    assert_eq!(site.fetches_of("https://blog.site.test/robots.txt"), 0);

    let links = storage.get_links(result.website.id).unwrap();
    let blog_link = links
        .iter()
        .find(|l| l.link.target_url == BLOG_POST)
        .expect("blog link row");
    assert!(!blog_link.link.is_internal);
}

#[tokio::test]
async fn test_disallowed_fallback_sitemap_is_never_fetched() {
    let db = TempDir::new().unwrap();
    let site = ScriptedSite::new()
        .text("/robots.txt", 200, "User-agent: *\nDisallow: /sitemap.xml\n")
        .text("/sitemap.xml", 200, "<urlset><url><loc>https://site.test/</loc></url></urlset>")
        .html("/", page("Home", PROSE, &["/about"]))
        .html("/about", page("About", PROSE, &[ROOT]));
    let site = Arc::new(site);
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    let result = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(site.fetches_of("/sitemap.xml"), 0);
    assert_eq!(result.crawl.parsed, 2);
    assert!(result.issues.iter().any(|i| i.check == "sitemap_missing"));
}

#[tokio::test]
async fn test_disallowed_child_sitemaps_are_skipped() {
    let db = TempDir::new().unwrap();
    let robots = "User-agent: *\nDisallow: /sitemaps/private\n\
                  Sitemap: https://site.test/sitemap_index.xml\n";
    let index = "<sitemapindex>\
                 <sitemap><loc>https://site.test/sitemaps/public.xml</loc></sitemap>\
                 <sitemap><loc>https://site.test/sitemaps/private.xml</loc></sitemap>\
                 <sitemap><loc>https://other.test/sitemap.xml</loc></sitemap>\
                 </sitemapindex>";
    let site = ScriptedSite::new()
        .text("/robots.txt", 200, robots)
        .text("/sitemap_index.xml", 200, index)
        .text(
            "/sitemaps/public.xml",
            200,
            "<urlset><url><loc>https://site.test/</loc></url></urlset>",
        )
        .text(
            "/sitemaps/private.xml",
            200,
            "<urlset><url><loc>https://site.test/hidden</loc></url></urlset>",
        )
        .html("/", page("Home", PROSE, &["/about"]))
        .html("/about", page("About", PROSE, &[ROOT]));
    let site = Arc::new(site);
    let (auditor, storage) = auditor_with(fast_config(&db), site.clone());

    let result = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(site.fetches_of("/sitemap_index.xml"), 1);
    assert_eq!(site.fetches_of("/sitemaps/public.xml"), 1);
    assert_eq!(site.fetches_of("/sitemaps/private.xml"), 0);
    assert_eq!(site.fetches_of("https://other.test/sitemap.xml"), 0);
    assert!(!result.issues.iter().any(|i| i.check == "sitemap_missing"));

    // Robots rules for pages still apply as before
    let pages = storage.lock().unwrap().get_pages(result.website.id).unwrap();
    assert!(pages
        .iter()
        .all(|p| p.error_reason.as_deref() != Some(REASON_ROBOTS_DISALLOWED)));
}
