//! End-to-end crawl and analysis scenarios against a scripted site

use crate::support::{auditor_with, fast_config, page, Reply, ScriptedSite, PROSE, ROOT};
use seo_audit::analysis::Severity;
use seo_audit::crawler::REASON_ROBOTS_DISALLOWED;
use seo_audit::{AuditRequest, AuditStatus, ErrorKind, PageStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Every farm page links to ten fresh farm pages
fn link_farm() -> ScriptedSite {
    ScriptedSite::new()
        .text("/robots.txt", 200, "User-agent: *\nAllow: /\n")
        .html("/", page("Home", PROSE, &["/farm/1", "/farm/2", "/farm/3"]))
        .dynamic("/farm/", |url| {
            let id: u64 = url
                .path()
                .trim_start_matches("/farm/")
                .parse()
                .unwrap_or(0);
            let children: Vec<String> = (0..10).map(|k| format!("/farm/{}", id * 10 + k)).collect();
            let links: Vec<&str> = children.iter().map(|s| s.as_str()).collect();
            Reply::Html(page(&format!("Farm {}", id), PROSE, &links))
        })
}

#[tokio::test]
async fn test_link_farm_respects_page_and_depth_limits() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(link_farm());
    let (auditor, storage) = auditor_with(fast_config(&db), site.clone());

    let request = AuditRequest::new(ROOT).max_pages(5).max_depth(2);
    let outcome = auditor.run(request, CancellationToken::new()).await.unwrap();
    let result = outcome.result;

    assert_eq!(result.status, AuditStatus::Success);
    assert_eq!(result.crawl.parsed, 5);

    let pages = storage.lock().unwrap().get_pages(result.website.id).unwrap();
    let parsed: Vec<_> = pages.iter().filter(|p| p.status == PageStatus::Parsed).collect();
    assert_eq!(parsed.len(), 5);
    assert!(pages.iter().all(|p| p.depth <= 2));
    assert_eq!(parsed[0].url, ROOT);
    assert_eq!(result.top_pages.len(), 5);
    assert_eq!(result.top_pages[0].url, ROOT);
}

/// Audits a site where a deep page links to a URL a slow page enqueues later
async fn ranking_with_workers(workers: u32) -> Vec<(String, usize, usize)> {
    let db = TempDir::new().unwrap();
    let mut config = fast_config(&db);
    config.crawler.max_concurrent_fetches = workers;
    let site = ScriptedSite::new()
        .text("/robots.txt", 200, "User-agent: *\nAllow: /\n")
        .html("/", page("Home", PROSE, &["/a", "/slow"]))
        .html("/a", page("A", PROSE, &["/d"]))
        .html("/d", page("D", PROSE, &["/e"]))
        .html("/slow", page("Slow", PROSE, &["/e"]))
        .html("/e", page("E", PROSE, &[]))
        .slow("/slow", Duration::from_millis(300));
    let (auditor, _storage) = auditor_with(config, Arc::new(site));

    let request = AuditRequest::new(ROOT).max_depth(2);
    let result = auditor
        .run(request, CancellationToken::new())
        .await
        .unwrap()
        .result;

    let mut ranking: Vec<_> = result
        .top_pages
        .iter()
        .map(|p| (p.url.clone(), p.rank, p.inlinks))
        .collect();
    ranking.sort();
    ranking
}

#[tokio::test]
async fn test_ranking_does_not_depend_on_fetch_timing() {
    let sequential = ranking_with_workers(1).await;
    let concurrent = ranking_with_workers(4).await;

    let inlinks_of_e = sequential
        .iter()
        .find(|(url, _, _)| url == "https://site.test/e")
        .map(|(_, _, inlinks)| *inlinks);
    assert_eq!(inlinks_of_e, Some(2));
    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_robots_disallowed_pages_are_only_skipped() {
    let db = TempDir::new().unwrap();
    let site = ScriptedSite::new()
        .text("/robots.txt", 200, "User-agent: *\nDisallow: /private/\n")
        .html(
            "/",
            page("Home", PROSE, &["/private/a", "/private/b", "/public"]),
        )
        .html("/public", page("Public", PROSE, &["/private/c", "/"]))
        .dynamic("/private/", |_| Reply::Html(page("Secret", PROSE, &[])));
    let site = Arc::new(site);
    let (auditor, storage) = auditor_with(fast_config(&db), site.clone());

    let outcome = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    let result = outcome.result;

    let pages = storage.lock().unwrap().get_pages(result.website.id).unwrap();
    let private: Vec<_> = pages.iter().filter(|p| p.url.contains("/private/")).collect();
    assert_eq!(private.len(), 3);
    for page in &private {
        assert_eq!(page.status, PageStatus::Skipped);
        assert_eq!(page.error_reason.as_deref(), Some(REASON_ROBOTS_DISALLOWED));
    }
    assert_eq!(site.fetches_of("/private/a"), 0);
    assert_eq!(result.skipped_pages.len(), 3);
    assert_eq!(result.crawl.parsed, 2);
    // Skipped pages do not make the audit partial
    assert_eq!(result.status, AuditStatus::Success);
}

#[tokio::test]
async fn test_unreachable_root_fails_without_pages() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::new().dynamic("/", |_| Reply::Unreachable));
    let (auditor, storage) = auditor_with(fast_config(&db), site);

    let err = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkError);

    let storage = storage.lock().unwrap();
    let website = storage.get_website(1).unwrap();
    assert_eq!(website.status, AuditStatus::Failed);
    assert!(website.finished_at.is_some());
    assert!(storage.get_pages(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_page_is_insufficient_text_but_still_ranked() {
    let db = TempDir::new().unwrap();
    let empty = r#"<!DOCTYPE html><html><head><title>Empty</title></head><body></body></html>"#;
    let site = ScriptedSite::new()
        .html("/", page("Home", PROSE, &["/empty", "/guide"]))
        .html("/empty", empty.to_string())
        .html("/guide", page("Guide", PROSE, &["/"]));
    let (auditor, _storage) = auditor_with(fast_config(&db), Arc::new(site));

    let result = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap()
        .result;

    let empty_url = "https://site.test/empty";
    let text = result
        .text
        .pages
        .iter()
        .find(|p| p.url == empty_url)
        .expect("empty page has a text entry");
    assert!(text.insufficient);
    assert_eq!(text.word_count, 0);

    assert!(result.top_pages.iter().any(|p| p.url == empty_url));
    let on_page = result
        .on_page
        .iter()
        .find(|p| p.url == empty_url)
        .expect("empty page is analyzed on-page");
    assert!(on_page.issues.iter().any(|i| i.check == "content_empty"));
    assert!(result
        .issues
        .iter()
        .any(|i| i.check == "text_insufficient" && i.page_url.as_deref() == Some(empty_url)));
}

#[tokio::test]
async fn test_failed_pages_make_a_partial_success() {
    let db = TempDir::new().unwrap();
    let site = ScriptedSite::new()
        .html("/", page("Home", PROSE, &["/ok", "/broken"]))
        .html("/ok", page("Fine", PROSE, &["/"]))
        .text("/broken", 500, "boom");
    let (auditor, _storage) = auditor_with(fast_config(&db), Arc::new(site));

    let outcome = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    let result = outcome.result;

    assert_eq!(result.status, AuditStatus::PartialSuccess);
    assert_eq!(result.failed_pages.len(), 1);
    assert_eq!(result.failed_pages[0].reason, "http-500");
    assert!(!result.timed_out);
    // Issues come out most urgent first
    assert!(result.issues.windows(2).all(|w| w[0].severity <= w[1].severity));
    assert!(result.count_by_severity(Severity::Critical) <= result.issues.len());
}

#[tokio::test]
async fn test_timeout_returns_partial_result_that_is_not_cached() {
    let db = TempDir::new().unwrap();
    let mut config = fast_config(&db);
    config.crawler.audit_timeout = 1;
    let site = Arc::new(link_farm().delay(Duration::from_millis(300)));
    let (auditor, _storage) = auditor_with(config, site);

    let request = AuditRequest::new(ROOT).max_pages(200).max_depth(5);
    let outcome = auditor
        .run(request, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.result.timed_out);
    assert_eq!(outcome.result.status, AuditStatus::PartialSuccess);
    assert!(outcome.result.crawl.parsed >= 1);
    assert!(outcome.result.crawl.parsed < 200);
    assert!(auditor.cache().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_audit_is_recorded_and_not_cached() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(link_farm());
    let (auditor, storage) = auditor_with(fast_config(&db), site);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = auditor
        .run(AuditRequest::new(ROOT), cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(
        storage.lock().unwrap().get_website(1).unwrap().status,
        AuditStatus::Cancelled
    );
    assert!(auditor.cache().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_request_touches_nothing() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(link_farm());
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    let err = auditor
        .run(
            AuditRequest::new(ROOT).max_pages(0),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(site.total_fetches(), 0);
}
