use crate::url::SubdomainPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for seo-audit
///
/// Every section has defaults, so an empty file yields `Config::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub ranking: RankingConfig,
    pub scoring: ScoringConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent page fetches
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "minimum-request-interval")]
    pub minimum_request_interval: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "fetch-timeout")]
    pub fetch_timeout: u64,

    /// Attempts per URL before a transient failure becomes final
    #[serde(rename = "retry-attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry, doubled for each further attempt (milliseconds)
    #[serde(rename = "retry-base-delay")]
    pub retry_base_delay: u64,

    /// Whole-audit timeout (seconds)
    #[serde(rename = "audit-timeout")]
    pub audit_timeout: u64,

    /// Whether subdomains of the root count as internal
    #[serde(rename = "subdomain-policy")]
    pub subdomain_policy: SubdomainPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            minimum_request_interval: 1000,
            fetch_timeout: 30,
            retry_attempts: 3,
            retry_base_delay: 1000,
            audit_timeout: 1800,
            subdomain_policy: SubdomainPolicy::Internal,
        }
    }
}

impl CrawlerConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.minimum_request_interval)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SeoAuditBot".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Full user agent header value: `Name/Version (+url; email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }

    /// Product token matched against robots.txt `User-agent` lines
    pub fn robots_token(&self) -> &str {
        &self.crawler_name
    }
}

/// Persistent storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "seo-audit.db".to_string(),
        }
    }
}

/// Audit result cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a completed audit stays reusable (days)
    #[serde(rename = "ttl-days")]
    pub ttl_days: u32,

    /// How long a failed audit is remembered (minutes, 0 disables)
    #[serde(rename = "failure-cooldown-minutes")]
    pub failure_cooldown_minutes: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            failure_cooldown_minutes: 10,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_days) * 24 * 60 * 60)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(u64::from(self.failure_cooldown_minutes) * 60)
    }
}

/// Page importance weights
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Number of ranked pages passed to on-page analysis
    #[serde(rename = "top-n")]
    pub top_n: usize,

    /// Fixed bonus for the root page
    #[serde(rename = "homepage-bonus")]
    pub homepage_bonus: f64,

    /// Multiplied by 1 / (depth + 1)
    #[serde(rename = "depth-weight")]
    pub depth_weight: f64,

    /// Points per distinct internal inlink
    #[serde(rename = "inlink-weight")]
    pub inlink_weight: f64,

    /// Upper bound on the inlink component
    #[serde(rename = "inlink-cap")]
    pub inlink_cap: f64,

    /// Points for substantial extracted text
    #[serde(rename = "content-weight")]
    pub content_weight: f64,

    /// Points per present title, meta description and H1
    #[serde(rename = "metadata-weight")]
    pub metadata_weight: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            homepage_bonus: 100.0,
            depth_weight: 10.0,
            inlink_weight: 2.0,
            inlink_cap: 50.0,
            content_weight: 10.0,
            metadata_weight: 5.0,
        }
    }
}

/// Category weights for the overall score
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    #[serde(rename = "technical-weight")]
    pub technical_weight: f64,

    #[serde(rename = "on-page-weight")]
    pub on_page_weight: f64,

    #[serde(rename = "text-weight")]
    pub text_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            technical_weight: 0.35,
            on_page_weight: 0.45,
            text_weight: 0.20,
        }
    }
}
