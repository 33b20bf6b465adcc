//! Robots.txt handling module
//!
//! This module provides functionality for fetching and parsing robots.txt
//! files. The coordinator fetches each host's file at most once per audit.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::{fetch_with_retry, Fetcher, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How a host's robots.txt fetch turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotsStatus {
    /// 2xx with a body
    Found,
    /// 4xx; everything is allowed
    Missing,
    /// Network error or 5xx; everything is allowed
    Unavailable,
}

/// A host's robots.txt as fetched for this audit
#[derive(Debug, Clone)]
pub struct HostRobots {
    pub url: String,
    pub status: RobotsStatus,
    pub robots: ParsedRobots,
}

impl HostRobots {
    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        self.robots.is_allowed(url.as_str(), user_agent)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.robots
            .crawl_delay(user_agent)
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| Duration::from_secs_f64(d.min(60.0)))
    }
}

/// Returns the robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.join("/robots.txt").ok()
}

/// Fetches robots.txt for the origin of `url`
///
/// Never fails: a missing or unreachable file yields an allow-all policy
/// with the status recorded for the technical report.
pub async fn fetch_robots(
    fetcher: &dyn Fetcher,
    url: &Url,
    timeout: Duration,
    retry: RetryPolicy,
    cancel: &CancellationToken,
) -> HostRobots {
    let Some(robots_url) = robots_url(url) else {
        return HostRobots {
            url: url.to_string(),
            status: RobotsStatus::Unavailable,
            robots: ParsedRobots::allow_all(),
        };
    };

    let (status, robots) = match fetch_with_retry(fetcher, &robots_url, timeout, retry, cancel).await
    {
        Ok(response) if response.is_success() => (
            RobotsStatus::Found,
            ParsedRobots::from_content(&response.body),
        ),
        Ok(response) if (400..500).contains(&response.status) => {
            tracing::debug!("No robots.txt at {} ({})", robots_url, response.status);
            (RobotsStatus::Missing, ParsedRobots::allow_all())
        }
        Ok(response) => {
            tracing::warn!(
                "robots.txt at {} returned HTTP {}, allowing all",
                robots_url,
                response.status
            );
            (RobotsStatus::Unavailable, ParsedRobots::allow_all())
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
            (RobotsStatus::Unavailable, ParsedRobots::allow_all())
        }
    };

    HostRobots {
        url: robots_url.to_string(),
        status,
        robots,
    }
}
