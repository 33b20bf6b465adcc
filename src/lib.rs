//! seo-audit: a bounded, polite SEO audit pipeline
//!
//! This crate crawls a website within page and depth limits, respecting
//! robots.txt and per-host rate limits, then runs technical, text, ranking
//! and on-page analyses over the crawl to produce a weighted score and a
//! prioritized list of issues. Results are cached by audit fingerprint.

pub mod analysis;
pub mod audit;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod report;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use storage::StorageError;

/// Main error type for audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("An audit with fingerprint {fingerprint} is already running")]
    Busy { fingerprint: String },

    #[error("Audit timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Audit was cancelled")]
    Cancelled,

    #[error("Root URL disallowed by robots.txt: {url}")]
    RootDisallowed { url: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`AuditError`], stable across variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkError,
    ParseError,
    InvalidInput,
    BusyError,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::ParseError => "parse_error",
            Self::InvalidInput => "invalid_input",
            Self::BusyError => "busy_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl AuditError {
    /// Returns the error kind callers switch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::RootDisallowed { .. } | Self::HttpClient(_) => {
                ErrorKind::NetworkError
            }
            Self::Parse { .. } => ErrorKind::ParseError,
            Self::InvalidInput(_) | Self::Url(_) => ErrorKind::InvalidInput,
            Self::Busy { .. } => ErrorKind::BusyError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_)
            | Self::Storage(_)
            | Self::Cache(_)
            | Self::Serialization(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use audit::{AuditContext, AuditOutcome, AuditRequest, Auditor, Language};
pub use config::Config;
pub use report::{AuditResult, AuditStatus};
pub use state::PageStatus;
pub use crate::url::{normalize_url, registrable_domain, SubdomainPolicy};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = AuditError::Network {
            url: "https://example.com/".to_string(),
            message: "dns error".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NetworkError);

        let err = AuditError::Busy {
            fingerprint: "abc".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::BusyError);

        assert_eq!(AuditError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            AuditError::InvalidInput("max_pages".to_string()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            AuditError::Url(UrlError::MissingDomain).kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_error_kind_strings() {
        assert_eq!(ErrorKind::NetworkError.as_str(), "network_error");
        assert_eq!(ErrorKind::BusyError.as_str(), "busy_error");
    }
}
