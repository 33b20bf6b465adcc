//! Shared test helpers: a scripted site and an auditor wired to it

use async_trait::async_trait;
use seo_audit::cache::CacheManager;
use seo_audit::config::Config;
use seo_audit::crawler::{FetchError, FetchResponse, Fetcher};
use seo_audit::storage::{open_storage, SharedStorage};
use seo_audit::Auditor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

pub const ROOT: &str = "https://site.test/";

type Route = Box<dyn Fn(&Url) -> Option<Reply> + Send + Sync>;

/// What the scripted site answers for one URL
#[derive(Debug, Clone)]
pub enum Reply {
    Html(String),
    Text(u16, String),
    Unreachable,
}

/// A site served from memory, counting every request
pub struct ScriptedSite {
    routes: Vec<Route>,
    delay: Duration,
    slow: HashMap<String, Duration>,
    total: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
}

/// Resolves a route target: a path on the root host or an absolute URL
fn target(path: &str) -> String {
    Url::parse(ROOT).unwrap().join(path).unwrap().to_string()
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            delay: Duration::ZERO,
            slow: HashMap::new(),
            total: AtomicUsize::new(0),
            per_url: Mutex::new(HashMap::new()),
        }
    }

    /// Serves HTML at an exact path of the root host, or an absolute URL
    pub fn html(mut self, path: &str, body: String) -> Self {
        let target = target(path);
        self.routes.push(Box::new(move |url: &Url| {
            (url.as_str() == target).then(|| Reply::Html(body.clone()))
        }));
        self
    }

    /// Serves a plain-text response at an exact path or absolute URL
    pub fn text(mut self, path: &str, status: u16, body: &str) -> Self {
        let target = target(path);
        let body = body.to_string();
        self.routes.push(Box::new(move |url: &Url| {
            (url.as_str() == target).then(|| Reply::Text(status, body.clone()))
        }));
        self
    }

    /// Makes requests of one path or URL take `delay`
    pub fn slow(mut self, path: &str, delay: Duration) -> Self {
        self.slow.insert(target(path), delay);
        self
    }

    /// Answers every request under `prefix` with a generated reply
    pub fn dynamic(
        mut self,
        prefix: &str,
        reply: impl Fn(&Url) -> Reply + Send + Sync + 'static,
    ) -> Self {
        let prefix = target(prefix);
        self.routes.push(Box::new(move |url: &Url| {
            url.as_str().starts_with(&prefix).then(|| reply(url))
        }));
        self
    }

    /// Makes every request take `delay`
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Requests of a path on the root host, or of an absolute URL
    pub fn fetches_of(&self, path: &str) -> usize {
        self.per_url
            .lock()
            .unwrap()
            .get(&target(path))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedSite {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchResponse, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .per_url
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;
        let delay = self.slow.get(url.as_str()).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .routes
            .iter()
            .find_map(|route| route(url))
            .unwrap_or_else(|| Reply::Text(404, "not found".to_string()));

        let (status, content_type, body) = match reply {
            Reply::Html(body) => (200, "text/html; charset=utf-8", body),
            Reply::Text(status, body) => (status, "text/plain", body),
            Reply::Unreachable => {
                return Err(FetchError::Connect(format!(
                    "dns error: failed to lookup address information for {}",
                    url.host_str().unwrap_or("")
                )))
            }
        };

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Ok(FetchResponse {
            final_url: url.clone(),
            status,
            headers,
            body,
            elapsed: Duration::from_millis(40),
        })
    }
}

/// Builds an HTML document with a title, some prose and links
pub fn page(title: &str, text: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">Read about {}</a></li>"#, href, href))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<title>{title} | Site Test Example</title>
<meta name="description" content="{title}: a page of the scripted site used to exercise the audit pipeline end to end.">
<meta name="viewport" content="width=device-width, initial-scale=1">
</head><body>
<h1>{title} for the scripted test site</h1>
<p>{text}</p>
<ul>{anchors}</ul>
</body></html>"#
    )
}

pub const PROSE: &str = "Gardening guides explain how soil, water and sunlight shape healthy \
plants. Our gardening team writes practical guides about vegetables, herbs and flowers, \
and every guide covers planting, watering and harvesting in simple steps that beginners \
can follow throughout the growing season.";

/// Config tuned for fast tests: no politeness delay, one attempt per request
pub fn fast_config(db: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.minimum_request_interval = 0;
    config.crawler.retry_attempts = 1;
    config.crawler.retry_base_delay = 1;
    config.crawler.fetch_timeout = 5;
    config.crawler.max_concurrent_fetches = 4;
    config.storage.database_path = db
        .path()
        .join("audit.db")
        .to_string_lossy()
        .into_owned();
    config
}

/// An auditor over a fresh database and the given fetcher
pub fn auditor_with(config: Config, fetcher: Arc<dyn Fetcher>) -> (Auditor, SharedStorage) {
    let path = std::path::PathBuf::from(&config.storage.database_path);
    let storage = open_storage(&path).unwrap();
    let cache = CacheManager::open(&path, config.cache.ttl(), config.cache.failure_cooldown())
        .unwrap();
    let auditor = Auditor::new(
        Arc::new(config),
        storage.clone(),
        Arc::new(cache),
        fetcher,
    );
    (auditor, storage)
}
