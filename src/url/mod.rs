//! URL handling module for seo-audit
//!
//! This module provides URL normalization, domain extraction, and the
//! internal/external scope decision used for both link classification and
//! traversal eligibility.

mod domain;
mod normalize;

pub use domain::{extract_domain, registrable_domain};
pub use normalize::normalize_url;

use serde::{Deserialize, Serialize};
use url::Url;

/// How subdomains of the root are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubdomainPolicy {
    /// Any host sharing the root's registrable domain is internal
    #[default]
    Internal,
    /// Only the root's exact host is internal
    HostOnly,
}

impl SubdomainPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::HostOnly => "host-only",
        }
    }
}

/// The site boundary of an audit, derived from the normalized root URL
#[derive(Debug, Clone)]
pub struct SiteScope {
    host: String,
    registrable: String,
    policy: SubdomainPolicy,
}

impl SiteScope {
    /// Builds a scope from the audit root
    ///
    /// Returns None if the root has no host.
    pub fn new(root: &Url, policy: SubdomainPolicy) -> Option<Self> {
        Some(Self {
            host: extract_domain(root)?,
            registrable: registrable_domain(root)?,
            policy,
        })
    }

    /// Returns true if the URL belongs to the audited site
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use seo_audit::url::{SiteScope, SubdomainPolicy};
    ///
    /// let root = Url::parse("https://example.com/").unwrap();
    /// let scope = SiteScope::new(&root, SubdomainPolicy::Internal).unwrap();
    /// assert!(scope.is_internal(&Url::parse("https://blog.example.com/a").unwrap()));
    /// assert!(!scope.is_internal(&Url::parse("https://other.org/").unwrap()));
    /// ```
    pub fn is_internal(&self, url: &Url) -> bool {
        match self.policy {
            SubdomainPolicy::HostOnly => extract_domain(url).as_deref() == Some(&self.host),
            SubdomainPolicy::Internal => {
                registrable_domain(url).as_deref() == Some(&self.registrable)
            }
        }
    }
}
