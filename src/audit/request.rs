//! Audit requests and their validation

use crate::cache::fingerprint;
use crate::url::normalize_url;
use crate::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_MAX_DEPTH: u32 = 3;
pub const MAX_PAGES_LIMIT: u32 = 1000;
pub const MAX_DEPTH_LIMIT: u32 = 10;

/// Text language of an audit; `Auto` detects it per page
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Auto,
    Ko,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Ko => "ko",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "ko" => Ok(Self::Ko),
            "en" => Ok(Self::En),
            other => Err(AuditError::InvalidInput(format!(
                "language must be auto, ko or en, got {}",
                other
            ))),
        }
    }
}

/// What a caller asks to audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub root_url: String,
    pub max_pages: u32,
    pub max_depth: u32,
    pub language: Language,
    /// Ignore any cached result and crawl again
    pub force_refresh: bool,
}

impl AuditRequest {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: DEFAULT_MAX_DEPTH,
            language: Language::Auto,
            force_refresh: false,
        }
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Checks the request and derives the audit parameters
    ///
    /// Out-of-range limits are rejected, never clamped.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - `max_pages` or `max_depth` out of range
    /// * `Url` - the root URL is malformed or not http(s)
    pub fn validate(&self) -> Result<AuditParams> {
        if !(1..=MAX_PAGES_LIMIT).contains(&self.max_pages) {
            return Err(AuditError::InvalidInput(format!(
                "max_pages must be between 1 and {}, got {}",
                MAX_PAGES_LIMIT, self.max_pages
            )));
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(AuditError::InvalidInput(format!(
                "max_depth must be between 1 and {}, got {}",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }

        let root = normalize_url(self.root_url.trim())?;
        let fingerprint = fingerprint(&root, self.max_pages, self.max_depth, self.language);

        Ok(AuditParams {
            root,
            max_pages: self.max_pages,
            max_depth: self.max_depth,
            language: self.language,
            force_refresh: self.force_refresh,
            fingerprint,
        })
    }
}

/// A validated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditParams {
    /// Normalized root URL
    pub root: Url,
    pub max_pages: u32,
    pub max_depth: u32,
    pub language: Language,
    pub force_refresh: bool,
    pub fingerprint: String,
}
