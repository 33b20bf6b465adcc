//! The audit pipeline: cache, crawl, analyze, report, cache again

use crate::analysis::{PartialResults, SiteSnapshot};
use crate::audit::{AuditContext, AuditRequest};
use crate::cache::{CacheLookup, CacheManager, CachedFailure};
use crate::config::Config;
use crate::crawler::{Crawler, Fetcher, HttpFetcher};
use crate::report::{AuditResult, AuditStatus, ReportAggregator};
use crate::storage::{
    open_storage, KeywordRecord, SharedStorage, Storage, StorageError, StorageResult,
    TechnicalRecord, WebsiteParams,
};
use crate::{AuditError, ErrorKind, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A finished audit
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub result: AuditResult,
    /// The result was served from the cache without any fetch
    pub from_cache: bool,
}

/// Runs audits against shared storage, cache and fetcher
pub struct Auditor {
    config: Arc<Config>,
    storage: SharedStorage,
    cache: Arc<CacheManager>,
    fetcher: Arc<dyn Fetcher>,
}

fn with_storage<T>(
    storage: &SharedStorage,
    f: impl FnOnce(&mut (dyn Storage + Send)) -> StorageResult<T>,
) -> Result<T> {
    let mut guard = storage.lock().map_err(|_| StorageError::Poisoned)?;
    Ok(f(&mut *guard)?)
}

impl Auditor {
    pub fn new(
        config: Arc<Config>,
        storage: SharedStorage,
        cache: Arc<CacheManager>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            storage,
            cache,
            fetcher,
        }
    }

    /// Opens the configured database and builds the HTTP fetcher
    pub fn from_config(config: Config) -> Result<Self> {
        let path = Path::new(&config.storage.database_path);
        let storage = open_storage(path)?;
        let cache = CacheManager::open(path, config.cache.ttl(), config.cache.failure_cooldown())?;
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        Ok(Self::new(
            Arc::new(config),
            storage,
            Arc::new(cache),
            Arc::new(fetcher),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Runs one audit
    ///
    /// A cached result within its TTL is returned without any fetch unless
    /// the request forces a refresh. Only one audit per fingerprint may run
    /// at a time.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - the request failed validation
    /// * `Busy` - an audit with the same fingerprint is already running
    /// * `Network` / `Parse` / `RootDisallowed` - the root could not be crawled
    /// * `Timeout` - the audit timed out before any page was parsed
    /// * `Cancelled` - `cancel` fired
    pub async fn run(&self, request: AuditRequest, cancel: CancellationToken) -> Result<AuditOutcome> {
        let params = request.validate()?;
        let fingerprint = params.fingerprint.clone();

        if !params.force_refresh {
            if let Some(outcome) = self.lookup(&fingerprint)? {
                return Ok(outcome);
            }
        }

        let _claim = self.cache.claim(&fingerprint)?;

        // Another audit may have finished while we were checking
        if !params.force_refresh {
            if let Some(outcome) = self.lookup(&fingerprint)? {
                return Ok(outcome);
            }
        }

        let root_url = params.root.to_string();
        let website_id = with_storage(&self.storage, |s| {
            s.create_website(&WebsiteParams {
                root_url: root_url.clone(),
                max_pages: params.max_pages,
                max_depth: params.max_depth,
                language: params.language.as_str().to_string(),
                fingerprint: fingerprint.clone(),
            })
        })?;

        tracing::info!(
            "Auditing {} (max {} pages, depth {}, language {}, website {})",
            root_url,
            params.max_pages,
            params.max_depth,
            params.language,
            website_id
        );

        let ctx = AuditContext {
            params,
            config: self.config.clone(),
            cancel,
            storage: self.storage.clone(),
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
        };

        match execute(&ctx, website_id).await {
            Ok(result) => {
                with_storage(&self.storage, |s| {
                    s.finish_website(website_id, result.status, Some(result.overall_score))
                })?;
                if !result.timed_out {
                    self.cache.put(&fingerprint, &root_url, &result)?;
                }
                Ok(AuditOutcome {
                    result,
                    from_cache: false,
                })
            }
            Err(e) => {
                tracing::error!("Audit of {} failed: {}", root_url, e);
                let status = if e.kind() == ErrorKind::Cancelled {
                    AuditStatus::Cancelled
                } else {
                    AuditStatus::Failed
                };
                if let Err(finish_err) =
                    with_storage(&self.storage, |s| s.finish_website(website_id, status, None))
                {
                    tracing::warn!("Could not record failure of {}: {}", root_url, finish_err);
                }
                if let Some(failure) = CachedFailure::from_error(&e) {
                    self.cache.put_failure(&fingerprint, &root_url, &failure)?;
                }
                Err(e)
            }
        }
    }

    fn lookup(&self, fingerprint: &str) -> Result<Option<AuditOutcome>> {
        match self.cache.get(fingerprint)? {
            CacheLookup::Hit(result) => {
                tracing::info!("Serving cached audit {}", fingerprint);
                Ok(Some(AuditOutcome {
                    result: *result,
                    from_cache: true,
                }))
            }
            CacheLookup::CoolingDown(failure) => {
                tracing::info!("Audit {} failed recently; not retrying yet", fingerprint);
                Err(failure.into_error())
            }
            CacheLookup::Miss => Ok(None),
        }
    }
}

/// Crawls and analyzes one website row
async fn execute(ctx: &AuditContext, website_id: i64) -> Result<AuditResult> {
    let started = Instant::now();
    let crawl_cancel = ctx.cancel.child_token();
    let timed_out = Arc::new(AtomicBool::new(false));

    let watchdog = {
        let token = crawl_cancel.clone();
        let flag = timed_out.clone();
        let limit = ctx.config.crawler.audit_timeout();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    tracing::warn!("Audit timeout of {:?} reached, stopping crawl", limit);
                    flag.store(true, Ordering::SeqCst);
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    };

    let crawled = match Crawler::new(ctx, website_id, crawl_cancel) {
        Ok(crawler) => crawler.run().await,
        Err(e) => Err(e),
    };
    watchdog.abort();
    let outcome = crawled?;

    if ctx.cancel.is_cancelled() {
        return Err(AuditError::Cancelled);
    }
    let timed_out = timed_out.load(Ordering::SeqCst);
    if outcome.stats.parsed == 0 {
        return Err(if timed_out {
            AuditError::Timeout {
                elapsed: started.elapsed(),
            }
        } else {
            AuditError::Network {
                url: ctx.params.root.to_string(),
                message: "no page could be crawled".to_string(),
            }
        });
    }

    tracing::info!("Analyzing {} pages", outcome.stats.parsed);
    let (website, pages) = with_storage(&ctx.storage, |s| {
        Ok((s.get_website(website_id)?, s.get_pages(website_id)?))
    })?;

    let snapshot = SiteSnapshot {
        website: &website,
        root: &ctx.params.root,
        pages: &pages,
        graph: &outcome.graph,
        signals: &outcome.signals,
        language: ctx.params.language,
        robots_token: ctx.config.user_agent.robots_token(),
    };

    let aggregator = ReportAggregator::new(&ctx.config);
    let partials = aggregator.analyze(&snapshot, &ctx.cancel)?;
    persist_findings(&ctx.storage, website_id, &partials)?;

    aggregator.assemble(&snapshot, partials, outcome.stats, timed_out)
}

/// Writes per-page keywords and technical category results
fn persist_findings(
    storage: &SharedStorage,
    website_id: i64,
    partials: &PartialResults,
) -> Result<()> {
    let mut technical = Vec::new();
    if let Some(report) = &partials.technical {
        for category in &report.categories {
            technical.push(TechnicalRecord {
                category: category.category.as_str().to_string(),
                score: category.score,
                passed: category.passed,
                details_json: serde_json::to_string(&category.details)?,
            });
        }
    }

    with_storage(storage, |s| {
        if let Some(text) = &partials.text {
            for page in text.pages.iter().filter(|p| !p.keywords.is_empty()) {
                let keywords: Vec<KeywordRecord> = page
                    .keywords
                    .iter()
                    .map(|k| KeywordRecord {
                        term: k.term.clone(),
                        frequency: k.count,
                        density: k.density,
                    })
                    .collect();
                s.bulk_upsert_keywords(page.page_id, &keywords)?;
            }
        }
        if !technical.is_empty() {
            s.save_technical_results(website_id, &technical)?;
        }
        Ok(())
    })
}
