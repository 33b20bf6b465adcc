//! Result reuse, failure cool-down and per-fingerprint deduplication

use crate::support::{auditor_with, fast_config, page, ScriptedSite, PROSE, ROOT};
use seo_audit::cache::EntryKind;
use seo_audit::{AuditRequest, ErrorKind, Language};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn small_site() -> ScriptedSite {
    ScriptedSite::new()
        .text("/robots.txt", 200, "User-agent: *\nAllow: /\n")
        .html("/", page("Home", PROSE, &["/about", "/guides"]))
        .html("/about", page("About", PROSE, &["/"]))
        .html("/guides", page("Guides", PROSE, &["/", "/about"]))
}

#[tokio::test]
async fn test_second_audit_is_served_from_cache_without_fetching() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(small_site());
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    let first = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    assert!(!first.from_cache);
    let fetches = site.total_fetches();
    assert!(fetches >= 3);

    // Same fingerprint, spelled differently
    let second = auditor
        .run(
            AuditRequest::new("https://SITE.test/#intro"),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.result, first.result);
    assert_eq!(site.total_fetches(), fetches);

    let entries = auditor.cache().list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Result);
    assert_eq!(entries[0].fingerprint, first.result.website.fingerprint);
}

#[tokio::test]
async fn test_force_refresh_and_other_parameters_bypass_the_cache() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(small_site());
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    let after_first = site.fetches_of("/");

    let refreshed = auditor
        .run(
            AuditRequest::new(ROOT).force_refresh(true),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!refreshed.from_cache);
    assert_eq!(site.fetches_of("/"), after_first + 1);

    let english = auditor
        .run(
            AuditRequest::new(ROOT).language(Language::En),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!english.from_cache);
    assert_eq!(site.fetches_of("/"), after_first + 2);
    assert_eq!(auditor.cache().list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_audits_fetch_once() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(small_site().delay(Duration::from_millis(20)));
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    let (a, b) = tokio::join!(
        auditor.run(AuditRequest::new(ROOT), CancellationToken::new()),
        auditor.run(AuditRequest::new(ROOT), CancellationToken::new()),
    );

    let (done, busy) = match (a, b) {
        (Ok(done), Err(busy)) | (Err(busy), Ok(done)) => (done, busy),
        (a, b) => panic!("expected one success and one busy error, got {:?} / {:?}", a.is_ok(), b.is_ok()),
    };
    assert_eq!(busy.kind(), ErrorKind::BusyError);
    assert!(!done.from_cache);
    assert_eq!(site.fetches_of("/"), 1);

    // Once the first audit finishes, the claim is released and the result reused
    let fingerprint = done.result.website.fingerprint.clone();
    assert!(!auditor.cache().is_in_flight(&fingerprint));
    let again = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    assert!(again.from_cache);
    assert_eq!(again.result, done.result);
    assert_eq!(site.fetches_of("/"), 1);
}

#[tokio::test]
async fn test_failed_root_is_not_retried_during_cooldown() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::new().text("/", 503, "maintenance"));
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    let first = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(first.kind(), ErrorKind::NetworkError);
    let fetches = site.total_fetches();

    let second = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(second.kind(), ErrorKind::NetworkError);
    assert_eq!(second.to_string(), first.to_string());
    assert_eq!(site.total_fetches(), fetches);

    let entries = auditor.cache().list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Failure);
}

#[tokio::test]
async fn test_disabled_cooldown_retries_immediately() {
    let db = TempDir::new().unwrap();
    let mut config = fast_config(&db);
    config.cache.failure_cooldown_minutes = 0;
    let site = Arc::new(ScriptedSite::new().text("/", 503, "maintenance"));
    let (auditor, _storage) = auditor_with(config, site.clone());

    for _ in 0..2 {
        let err = auditor
            .run(AuditRequest::new(ROOT), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }
    assert_eq!(site.fetches_of("/"), 2);
    assert!(auditor.cache().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_forces_a_new_crawl() {
    let db = TempDir::new().unwrap();
    let site = Arc::new(small_site());
    let (auditor, _storage) = auditor_with(fast_config(&db), site.clone());

    auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(auditor.cache().purge_expired().unwrap(), 0);
    assert_eq!(auditor.cache().clear().unwrap(), 1);

    let outcome = auditor
        .run(AuditRequest::new(ROOT), CancellationToken::new())
        .await
        .unwrap();
    assert!(!outcome.from_cache);
    assert_eq!(site.fetches_of("/"), 2);
}
