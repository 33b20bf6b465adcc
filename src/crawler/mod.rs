//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - Frontier scheduling, page budget and rate limiting
//! - Sitemap discovery
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod graph;
mod parser;
mod scheduler;
mod sitemap;

pub use coordinator::{
    CrawlOutcome, CrawlStats, Crawler, SiteSignals, REASON_NON_HTML, REASON_ROBOTS_DISALLOWED,
};
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchError, FetchResponse, Fetcher, HttpFetcher,
    RetryPolicy,
};
pub use graph::{LinkEdge, LinkGraph};
pub use parser::{parse_html, ExtractedLink, ParsedPage};
pub use scheduler::{Claim, QueuedUrl, Scheduler};
pub use sitemap::{parse_sitemap, ParsedSitemap, SitemapEntry, SitemapKind, SitemapSnapshot};
