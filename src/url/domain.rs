use url::{Host, Url};

/// Second-level labels that act as public suffixes under a country code
/// (`example.co.uk`, `shop.co.kr`)
const SECOND_LEVEL_SUFFIXES: &[&str] = &[
    "ac", "co", "com", "edu", "go", "gov", "ne", "net", "or", "org", "re",
];

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::url::extract_domain;
///
/// let url = Url::parse("https://Blog.Example.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable domain of a URL's host
///
/// This is a heuristic: the last two labels, or the last three when the
/// host ends in a two-letter country code preceded by a common second-level
/// label. IP addresses and single-label hosts are their own registrable
/// domain.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::url::registrable_domain;
///
/// let url = Url::parse("https://blog.example.co.uk/").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.co.uk".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
        Host::Domain(domain) => Some(registrable_from_host(&domain.to_lowercase())),
    }
}

fn registrable_from_host(host: &str) -> String {
    let host = host.trim_end_matches('.');
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

    if labels.len() <= 2 {
        return labels.join(".");
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&second) {
        3
    } else {
        2
    };

    labels[labels.len() - keep..].join(".")
}
