//! Audits over real HTTP against a wiremock server

use crate::support::{auditor_with, fast_config, page, PROSE};
use seo_audit::config::UserAgentConfig;
use seo_audit::crawler::{Fetcher, HttpFetcher};
use seo_audit::{AuditError, AuditRequest, AuditStatus, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn http_fetcher() -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(&UserAgentConfig::default()).expect("client builds"))
}

#[tokio::test]
async fn test_full_audit_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n",
            base
        )),
    )
    .await;
    mount(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc>{base}/about</loc></url>
</urlset>"#
            ),
            "application/xml",
        ),
    )
    .await;
    mount(&server, "/", html(page("Home", PROSE, &["/about"]))).await;
    mount(&server, "/about", html(page("About", PROSE, &["/"]))).await;

    let db = TempDir::new().unwrap();
    let (auditor, _storage) = auditor_with(fast_config(&db), http_fetcher());

    let outcome = auditor
        .run(AuditRequest::new(base.clone()), CancellationToken::new())
        .await
        .unwrap();
    let result = outcome.result;

    assert_eq!(result.status, AuditStatus::Success);
    assert_eq!(result.crawl.parsed, 2);
    assert_eq!(result.top_pages[0].url, format!("{}/", base));
    assert!((0.0..=100.0).contains(&result.overall_score));

    // The site is served over plain HTTP, which the technical checks notice
    assert!(result.issues.iter().any(|i| i.check == "https_missing"));
    assert!(!result.issues.iter().any(|i| i.check == "sitemap_missing"));
    assert!(!result.issues.iter().any(|i| i.check == "robots_missing"));
    assert!(result.technical.core_web_vitals.estimated);
    assert_eq!(result.technical.core_web_vitals.source, "fetch-timing");
}

#[tokio::test]
async fn test_root_blocked_by_robots_fails_the_audit() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"),
    )
    .await;
    mount(&server, "/", html(page("Home", PROSE, &[]))).await;

    let db = TempDir::new().unwrap();
    let (auditor, storage) = auditor_with(fast_config(&db), http_fetcher());

    let err = auditor
        .run(AuditRequest::new(server.uri()), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AuditError::RootDisallowed { .. }));
    assert_eq!(err.kind(), ErrorKind::NetworkError);
    assert!(storage.lock().unwrap().get_pages(1).unwrap().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() == "/robots.txt"));
}

#[tokio::test]
async fn test_http_fetcher_follows_redirects() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri()).as_str()),
    )
    .await;
    mount(&server, "/new", html(page("New", PROSE, &[]))).await;

    let fetcher = http_fetcher();
    let url = url::Url::parse(&format!("{}/old", server.uri())).unwrap();
    let response = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.final_url.path(), "/new");
    assert!(response.is_html());
}

#[tokio::test]
async fn test_http_fetcher_reports_missing_pages_as_responses() {
    let server = MockServer::start().await;

    let fetcher = http_fetcher();
    let url = url::Url::parse(&format!("{}/nowhere", server.uri())).unwrap();
    let response = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert!(!response.is_transient());
}
