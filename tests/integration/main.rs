//! Integration tests for seo-audit
//!
//! Crawl scenarios run against an in-process scripted site so they are
//! deterministic; the HTTP tests use wiremock to exercise the real fetcher.

mod audit_tests;
mod cache_tests;
mod http_tests;
mod scope_tests;
mod support;
