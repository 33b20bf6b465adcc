//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - The `Fetcher` seam, so crawls can run against a scripted site in tests
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maximum redirect hops followed for a single request
const MAX_REDIRECTS: usize = 10;

/// A completed HTTP exchange, whatever its status code
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Response body decoded as text
    pub body: String,
    /// Time from request start to full body
    pub elapsed: Duration,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    /// Returns true for HTML documents
    ///
    /// A missing Content-Type is sniffed from the body.
    pub fn is_html(&self) -> bool {
        let content_type = self.content_type().to_ascii_lowercase();
        if content_type.is_empty() {
            let head: String = self.body.trim_start().chars().take(64).collect();
            let head = head.to_ascii_lowercase();
            return head.starts_with("<!doctype html") || head.starts_with("<html");
        }
        content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// HTTP 429 and 5xx are worth another attempt
    pub fn is_transient(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

/// A request that produced no HTTP response
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection broke while the body was being read
    #[error("response body could not be read: {0}")]
    Body(String),

    #[error("too many redirects")]
    Redirect,

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_) | Self::Body(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() {
            Self::Body(e.to_string())
        } else if e.is_redirect() {
            Self::Redirect
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Anything that can perform a GET request for the crawler
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use seo_audit::config::UserAgentConfig;
/// use seo_audit::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// The production fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError> {
        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(FetchResponse {
            final_url,
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }
}

/// How often, and how patiently, transient failures are retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each one after
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.min(16)))
    }
}

/// Fetches a URL, retrying timeouts, connection failures, HTTP 429 and 5xx
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | 2xx/3xx/4xx (not 429) | Return immediately |
/// | HTTP 429, 5xx | Retry; return the last response when attempts run out |
/// | Timeout, connect or body error | Retry; return the last error when attempts run out |
/// | Other network error | Return immediately |
///
/// Backoff sleeps end early when `cancel` fires; the last outcome is then
/// returned as-is.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &Url,
    timeout: Duration,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<FetchResponse, FetchError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        let outcome = fetcher.fetch(url, timeout).await;
        attempt += 1;

        let retry = match &outcome {
            Ok(response) => response.is_transient(),
            Err(e) => e.is_transient(),
        };
        if !retry || attempt >= attempts {
            return outcome;
        }

        let delay = policy.delay_for(attempt - 1);
        tracing::debug!(
            "Retrying {} in {:?} (attempt {}/{})",
            url,
            delay,
            attempt + 1,
            attempts
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return outcome,
        }
    }
}
