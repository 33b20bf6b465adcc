//! Audit fingerprints
//!
//! A fingerprint is the SHA-256 over every parameter that changes an audit's
//! outcome. Output options such as report paths never take part.

use crate::audit::Language;
use sha2::{Digest, Sha256};
use url::Url;

/// Bumped whenever the fingerprint input format changes
const FINGERPRINT_VERSION: &str = "v1";

/// Computes the cache key of an audit
///
/// `root` must already be normalized so that equivalent spellings of the
/// same site share a fingerprint.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::cache::fingerprint;
/// use seo_audit::Language;
///
/// let root = Url::parse("https://example.com/").unwrap();
/// let a = fingerprint(&root, 50, 3, Language::Auto);
/// assert_eq!(a, fingerprint(&root, 50, 3, Language::Auto));
/// assert_ne!(a, fingerprint(&root, 51, 3, Language::Auto));
/// assert_eq!(a.len(), 64);
/// ```
pub fn fingerprint(root: &Url, max_pages: u32, max_depth: u32, language: Language) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_VERSION.as_bytes());
    hasher.update(b"\n");
    hasher.update(root.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(max_pages.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(max_depth.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(language.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
