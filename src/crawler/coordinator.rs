//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Fetching the root first, failing the audit if it cannot be crawled
//! - A bounded pool of workers pulling from the shared frontier
//! - robots.txt (once per host) and per-host request spacing
//! - Committing each finished page, its links and graph edges in one
//!   critical section

use crate::audit::AuditContext;
use crate::crawler::fetcher::{fetch_with_retry, FetchResponse, Fetcher, RetryPolicy};
use crate::crawler::graph::{LinkEdge, LinkGraph};
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::scheduler::{Claim, QueuedUrl, Scheduler};
use crate::crawler::sitemap::{parse_sitemap, SitemapKind, SitemapSnapshot};
use crate::robots::{fetch_robots, HostRobots};
use crate::state::PageStatus;
use crate::storage::{LinkRecord, NewPage, SharedStorage};
use crate::url::{normalize_url, SiteScope};
use crate::{AuditError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How long an idle worker sleeps before polling the frontier again
const IDLE_POLL: Duration = Duration::from_millis(20);

/// Child sitemaps fetched from a sitemap index
const MAX_CHILD_SITEMAPS: usize = 5;

/// Skip reason for URLs blocked by robots.txt
pub const REASON_ROBOTS_DISALLOWED: &str = "robots-disallowed";

/// Skip reason for 2xx responses that are not HTML
pub const REASON_NON_HTML: &str = "non-html-content";

/// Counters describing a finished crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub parsed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// URLs still in the frontier when the crawl stopped
    pub pending: u32,
    pub requests: u32,
    pub duration_ms: u64,
}

/// Site-level facts gathered while crawling, for the technical checks
#[derive(Debug, Clone, Default)]
pub struct SiteSignals {
    pub robots: Option<HostRobots>,
    pub sitemap: SitemapSnapshot,
    pub root_final_url: Option<String>,
    pub root_headers: HashMap<String, String>,
}

/// Everything a crawl session hands to the analysis stage
#[derive(Debug)]
pub struct CrawlOutcome {
    pub website_id: i64,
    pub graph: LinkGraph,
    pub signals: SiteSignals,
    pub stats: CrawlStats,
    /// The crawl stopped early because its token was cancelled
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    Network,
    Http,
    Parse,
}

/// Result of visiting one claimed URL
#[derive(Debug)]
enum PageOutcome {
    Parsed {
        response: FetchResponse,
        page: ParsedPage,
    },
    Failed {
        status_code: Option<u16>,
        reason: String,
        kind: FailureKind,
    },
    Skipped {
        status_code: Option<u16>,
        reason: &'static str,
    },
    /// Cancelled before the request went out
    Abandoned,
}

struct CrawlState {
    scheduler: Scheduler,
    graph: LinkGraph,
    failed: u32,
    skipped: u32,
    fatal: Option<AuditError>,
}

struct Shared {
    website_id: i64,
    root: Url,
    scope: SiteScope,
    fetcher: Arc<dyn Fetcher>,
    storage: SharedStorage,
    robots_token: String,
    fetch_timeout: Duration,
    interval: Duration,
    retry: RetryPolicy,
    max_depth: u32,
    cancel: CancellationToken,
    state: Mutex<CrawlState>,
    robots: Mutex<HashMap<String, Arc<OnceCell<HostRobots>>>>,
}

/// Main crawler structure; one per audit
pub struct Crawler {
    shared: Arc<Shared>,
    workers: usize,
}

/// Rate-limit key: host plus effective port
fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").to_lowercase();
    match url.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

impl Crawler {
    /// Creates a crawler for an audit
    ///
    /// # Arguments
    ///
    /// * `ctx` - The audit context (parameters, storage, fetcher)
    /// * `website_id` - The website row pages are written under
    /// * `cancel` - Stops the crawl; usually a child of the audit token
    pub fn new(ctx: &AuditContext, website_id: i64, cancel: CancellationToken) -> Result<Self> {
        let config = &ctx.config;
        let params = &ctx.params;
        let scope = SiteScope::new(&params.root, config.crawler.subdomain_policy)
            .ok_or_else(|| AuditError::InvalidInput(format!("no host in {}", params.root)))?;

        let shared = Shared {
            website_id,
            root: params.root.clone(),
            scope,
            fetcher: ctx.fetcher.clone(),
            storage: ctx.storage.clone(),
            robots_token: config.user_agent.robots_token().to_string(),
            fetch_timeout: config.crawler.fetch_timeout(),
            interval: config.crawler.request_interval(),
            retry: RetryPolicy {
                attempts: config.crawler.retry_attempts,
                base_delay: Duration::from_millis(config.crawler.retry_base_delay),
            },
            max_depth: params.max_depth,
            cancel,
            state: Mutex::new(CrawlState {
                scheduler: Scheduler::new(params.max_pages, params.max_depth),
                graph: LinkGraph::new(),
                failed: 0,
                skipped: 0,
                fatal: None,
            }),
            robots: Mutex::new(HashMap::new()),
        };

        Ok(Self {
            shared: Arc::new(shared),
            workers: config.crawler.max_concurrent_fetches.max(1) as usize,
        })
    }

    /// Runs the crawl to completion, budget exhaustion or cancellation
    ///
    /// # Errors
    ///
    /// * `RootDisallowed` - robots.txt blocks the root URL
    /// * `Network` - the root could not be fetched after retries
    /// * `Parse` - the root is not a parseable HTML document
    /// * `Storage` - a page could not be persisted
    ///
    /// No page is written when the root fails.
    pub async fn run(self) -> Result<CrawlOutcome> {
        let started = Instant::now();
        let shared = self.shared;
        let root = shared.root.clone();

        tracing::info!(
            "Starting crawl of {} with {} workers",
            root,
            self.workers
        );

        {
            let mut state = shared.lock_state();
            if let Some(order) = state.scheduler.offer(root.clone(), 0) {
                state.graph.add_node(order, root.as_str());
            }
        }

        let root_robots = shared.robots_for(&root).await;
        let mut signals = SiteSignals::default();

        let claim = shared.lock_state().scheduler.claim();
        let Claim::Ready(root_entry) = claim else {
            return Err(AuditError::InvalidInput(format!(
                "root {} could not be scheduled",
                root
            )));
        };

        match shared.visit(&root_entry).await {
            PageOutcome::Skipped {
                reason: REASON_ROBOTS_DISALLOWED,
                ..
            } => {
                return Err(AuditError::RootDisallowed {
                    url: root.to_string(),
                })
            }
            PageOutcome::Skipped { status_code, .. } => {
                return Err(AuditError::Parse {
                    url: root.to_string(),
                    message: format!(
                        "root is not an HTML document (status {})",
                        status_code.unwrap_or(0)
                    ),
                })
            }
            PageOutcome::Failed { reason, kind, .. } => {
                return Err(match kind {
                    FailureKind::Parse => AuditError::Parse {
                        url: root.to_string(),
                        message: reason,
                    },
                    FailureKind::Network | FailureKind::Http => AuditError::Network {
                        url: root.to_string(),
                        message: reason,
                    },
                })
            }
            PageOutcome::Abandoned => {
                shared.lock_state().scheduler.complete(false);
                tracing::info!("Crawl of {} cancelled before the root was fetched", root);
            }
            parsed @ PageOutcome::Parsed { .. } => {
                if let PageOutcome::Parsed { response, .. } = &parsed {
                    signals.root_final_url = Some(response.final_url.to_string());
                    signals.root_headers = response.headers.clone();
                }
                shared.commit(&root_entry, parsed)?;
                signals.sitemap = shared.fetch_sitemap(&root_robots).await;
            }
        }
        signals.robots = Some(root_robots);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            let shared = shared.clone();
            workers.spawn(async move { shared.worker_loop(worker_id).await });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker stopped abnormally: {}", e);
            }
        }

        let mut state = shared.lock_state();
        if let Some(fatal) = state.fatal.take() {
            return Err(fatal);
        }

        let stats = CrawlStats {
            parsed: state.scheduler.parsed(),
            failed: state.failed,
            skipped: state.skipped,
            pending: state.scheduler.pending() as u32,
            requests: state.scheduler.request_count(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let interrupted = shared.cancel.is_cancelled();

        tracing::info!(
            "Crawl of {} finished: {} parsed, {} failed, {} skipped, {} pending, {} links{}",
            root,
            stats.parsed,
            stats.failed,
            stats.skipped,
            stats.pending,
            state.graph.edge_count(),
            if interrupted { " (interrupted)" } else { "" }
        );

        Ok(CrawlOutcome {
            website_id: shared.website_id,
            graph: std::mem::take(&mut state.graph),
            signals,
            stats,
            interrupted,
        })
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, CrawlState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let claim = self.lock_state().scheduler.claim();
            match claim {
                Claim::Done => break,
                Claim::Wait => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
                Claim::Ready(entry) => {
                    tracing::debug!("Worker {} processing {}", worker_id, entry.url);
                    let outcome = self.visit(&entry).await;
                    if let Err(e) = self.commit(&entry, outcome) {
                        tracing::error!("Failed to record {}: {}", entry.url, e);
                        let mut state = self.lock_state();
                        if state.fatal.is_none() {
                            state.fatal = Some(e);
                        }
                        drop(state);
                        self.cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    /// Waits for the next request slot of the URL's host
    ///
    /// Returns false if the crawl was cancelled while waiting.
    async fn wait_for_slot(&self, url: &Url) -> bool {
        let wait = self
            .lock_state()
            .scheduler
            .reserve_slot(&host_key(url), Instant::now(), self.interval);

        if !wait.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.cancel.cancelled() => return false,
            }
        }
        !self.cancel.is_cancelled()
    }

    /// Returns the robots.txt of the URL's origin, fetching it on first use
    async fn robots_for(&self, url: &Url) -> HostRobots {
        let origin = url.origin().ascii_serialization();
        let cell = {
            let mut map = self
                .robots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(origin)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| async {
            // Spacing applies to robots.txt too, but it is fetched even when
            // the wait is cut short so every waiter gets a policy
            self.wait_for_slot(url).await;
            let robots = fetch_robots(
                self.fetcher.as_ref(),
                url,
                self.fetch_timeout,
                self.retry,
                &self.cancel,
            )
            .await;

            if let Some(delay) = robots.crawl_delay(&self.robots_token) {
                tracing::debug!("Crawl-delay {:?} for {}", delay, host_key(url));
                self.lock_state()
                    .scheduler
                    .set_crawl_delay(&host_key(url), delay);
            }
            robots
        })
        .await
        .clone()
    }

    /// Fetches a non-page resource (sitemap) politely
    async fn fetch_resource(&self, url: &Url) -> Option<FetchResponse> {
        if !self.wait_for_slot(url).await {
            return None;
        }
        match fetch_with_retry(
            self.fetcher.as_ref(),
            url,
            self.fetch_timeout,
            self.retry,
            &self.cancel,
        )
        .await
        {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }

    /// Locates, fetches and parses the site's sitemap
    ///
    /// A `Sitemap:` directive on the audited site wins over `/sitemap.xml`.
    /// Sitemaps that robots.txt disallows are never requested.
    async fn fetch_sitemap(&self, robots: &HostRobots) -> SitemapSnapshot {
        let declared = robots
            .robots
            .sitemaps()
            .iter()
            .filter_map(|s| Url::parse(s).ok())
            .find(|u| self.scope.is_internal(u));

        let (url, declared_in_robots) = match declared {
            Some(url) => (url, true),
            None => match self.root.join("/sitemap.xml") {
                Ok(url) => (url, false),
                Err(_) => return SitemapSnapshot::default(),
            },
        };

        let mut snapshot = SitemapSnapshot {
            url: Some(url.to_string()),
            declared_in_robots,
            ..Default::default()
        };

        if !self.robots_for(&url).await.is_allowed(&url, &self.robots_token) {
            tracing::debug!("Not fetching sitemap {} (disallowed by robots.txt)", url);
            snapshot.error = Some(REASON_ROBOTS_DISALLOWED.to_string());
            return snapshot;
        }

        let Some(response) = self.fetch_resource(&url).await else {
            snapshot.error = Some("unreachable".to_string());
            return snapshot;
        };
        if !response.is_success() {
            snapshot.error = Some(format!("http-{}", response.status));
            return snapshot;
        }
        snapshot.found = true;

        let Some(parsed) = parse_sitemap(&response.body) else {
            snapshot.error = Some("not a sitemap document".to_string());
            return snapshot;
        };
        snapshot.valid = true;

        match parsed.kind {
            SitemapKind::UrlSet => snapshot.entries = parsed.entries,
            SitemapKind::Index => {
                for child in parsed.entries.iter().take(MAX_CHILD_SITEMAPS) {
                    let Ok(child_url) = Url::parse(&child.loc) else {
                        continue;
                    };
                    if !self.scope.is_internal(&child_url)
                        || !self
                            .robots_for(&child_url)
                            .await
                            .is_allowed(&child_url, &self.robots_token)
                    {
                        tracing::debug!("Not fetching child sitemap {}", child_url);
                        continue;
                    }
                    let Some(child_response) = self.fetch_resource(&child_url).await else {
                        continue;
                    };
                    if let Some(child_parsed) = child_response
                        .is_success()
                        .then(|| parse_sitemap(&child_response.body))
                        .flatten()
                    {
                        if child_parsed.kind == SitemapKind::UrlSet {
                            snapshot.entries.extend(child_parsed.entries);
                        }
                    }
                }
            }
        }

        tracing::debug!(
            "Sitemap {} lists {} URLs",
            url,
            snapshot.entries.len()
        );
        snapshot
    }

    /// Fetches and classifies one claimed URL
    async fn visit(&self, entry: &QueuedUrl) -> PageOutcome {
        let robots = self.robots_for(&entry.url).await;
        if !robots.is_allowed(&entry.url, &self.robots_token) {
            tracing::debug!("Skipping {} (disallowed by robots.txt)", entry.url);
            return PageOutcome::Skipped {
                status_code: None,
                reason: REASON_ROBOTS_DISALLOWED,
            };
        }

        if !self.wait_for_slot(&entry.url).await {
            return PageOutcome::Abandoned;
        }

        let response = match fetch_with_retry(
            self.fetcher.as_ref(),
            &entry.url,
            self.fetch_timeout,
            self.retry,
            &self.cancel,
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", entry.url, e);
                return PageOutcome::Failed {
                    status_code: None,
                    reason: e.to_string(),
                    kind: FailureKind::Network,
                };
            }
        };

        if response.status == 429 {
            self.lock_state()
                .scheduler
                .mark_rate_limited(&host_key(&entry.url));
        }

        if !response.is_success() {
            tracing::debug!("{} returned HTTP {}", entry.url, response.status);
            return PageOutcome::Failed {
                status_code: Some(response.status),
                reason: format!("http-{}", response.status),
                kind: FailureKind::Http,
            };
        }

        if !response.is_html() {
            return PageOutcome::Skipped {
                status_code: Some(response.status),
                reason: REASON_NON_HTML,
            };
        }

        match parse_html(&response.body, &response.final_url) {
            Ok(page) => PageOutcome::Parsed { response, page },
            Err(e) => PageOutcome::Failed {
                status_code: Some(response.status),
                reason: format!("parse-error: {}", e),
                kind: FailureKind::Parse,
            },
        }
    }

    /// Records a visited URL: budget, frontier, graph and storage together
    fn commit(&self, entry: &QueuedUrl, outcome: PageOutcome) -> Result<()> {
        let mut state = self.lock_state();

        let (page, links) = match outcome {
            PageOutcome::Abandoned => {
                state.scheduler.complete(false);
                return Ok(());
            }
            PageOutcome::Skipped {
                status_code,
                reason,
            } => {
                state.scheduler.complete(false);
                state.skipped += 1;
                (
                    self.terminal_page(entry, PageStatus::Skipped, status_code, reason.to_string()),
                    Vec::new(),
                )
            }
            PageOutcome::Failed {
                status_code,
                reason,
                ..
            } => {
                state.scheduler.complete(false);
                state.failed += 1;
                (
                    self.terminal_page(entry, PageStatus::Failed, status_code, reason),
                    Vec::new(),
                )
            }
            PageOutcome::Parsed { response, page } => {
                state.scheduler.complete(true);
                let links = self.follow_links(&mut state, entry, &page);
                (self.parsed_page(entry, response, page), links)
            }
        };

        let parsed = state.scheduler.parsed();
        self.storage
            .lock()
            .map_err(|_| crate::StorageError::Poisoned)?
            .record_page(self.website_id, &page, &links)?;

        if page.status == PageStatus::Parsed && parsed % 10 == 0 {
            tracing::info!(
                "Progress: {} pages parsed, {} in frontier",
                parsed,
                state.scheduler.pending()
            );
        }
        Ok(())
    }

    /// Classifies a parsed page's links, enqueues eligible ones and adds edges
    fn follow_links(
        &self,
        state: &mut CrawlState,
        entry: &QueuedUrl,
        page: &ParsedPage,
    ) -> Vec<LinkRecord> {
        let mut records = Vec::with_capacity(page.links.len());

        for link in &page.links {
            let Ok(target) = normalize_url(&link.url) else {
                continue;
            };
            let is_internal = self.scope.is_internal(&target);

            let traversable = is_internal && !link.nofollow && entry.depth < self.max_depth;
            if traversable && state.scheduler.order_of(target.as_str()).is_none() {
                if let Some(order) = state.scheduler.offer(target.clone(), entry.depth + 1) {
                    state.graph.add_node(order, target.as_str());
                }
            }

            state.graph.add_edge(
                entry.order,
                LinkEdge {
                    target_url: target.to_string(),
                    anchor_text: link.anchor_text.clone(),
                    is_internal,
                    nofollow: link.nofollow,
                },
            );
            records.push(LinkRecord {
                target_url: target.to_string(),
                anchor_text: link.anchor_text.clone(),
                is_internal,
                nofollow: link.nofollow,
            });
        }

        records
    }

    fn terminal_page(
        &self,
        entry: &QueuedUrl,
        status: PageStatus,
        status_code: Option<u16>,
        reason: String,
    ) -> NewPage {
        NewPage {
            url: entry.url.to_string(),
            status,
            status_code,
            depth: entry.depth,
            discovery_order: entry.order,
            title: None,
            meta_description: None,
            text: String::new(),
            meta: Default::default(),
            error_reason: Some(reason),
            fetched_at: Utc::now(),
        }
    }

    fn parsed_page(&self, entry: &QueuedUrl, response: FetchResponse, page: ParsedPage) -> NewPage {
        let mut meta = page.meta;
        let final_url = normalize_url(response.final_url.as_str())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| response.final_url.to_string());
        meta.redirected = final_url != entry.url.as_str();
        meta.final_url = Some(final_url);
        meta.content_type = response.header("content-type").map(str::to_string);
        meta.response_time_ms = Some(response.elapsed.as_millis() as u64);
        meta.body_bytes = response.body.len();
        meta.hsts = response.header("strict-transport-security").is_some();

        NewPage {
            url: entry.url.to_string(),
            status: PageStatus::Parsed,
            status_code: Some(response.status),
            depth: entry.depth,
            discovery_order: entry.order,
            title: page.title,
            meta_description: page.meta_description,
            text: page.text,
            meta,
            error_reason: None,
            fetched_at: Utc::now(),
        }
    }
}
