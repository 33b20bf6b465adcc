//! Robots.txt parser implementation
//!
//! Allow/deny decisions are delegated to the robotstxt crate; crawl-delay,
//! sitemap directives and a coarse validity check are read directly.

use robotstxt::DefaultMatcher;

/// Directives a well-formed robots.txt may contain
const KNOWN_DIRECTIVES: &[&str] = &[
    "user-agent",
    "allow",
    "disallow",
    "crawl-delay",
    "sitemap",
    "host",
    "noindex",
    "clean-param",
    "request-rate",
    "visit-time",
];

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all regardless of content
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The crawler's product token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent, in seconds
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let normalized_agent = user_agent.to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_agent_lines = false;
        let mut delay_for_wildcard: Option<f64> = None;
        let mut delay_for_agent: Option<f64> = None;

        for (key, value) in directives(&self.content) {
            match key.as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group
                    if !in_agent_lines {
                        group_agents.clear();
                    }
                    group_agents.push(value.to_lowercase());
                    in_agent_lines = true;
                }
                "crawl-delay" => {
                    in_agent_lines = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if group_agents
                        .iter()
                        .any(|ua| ua != "*" && normalized_agent.contains(ua.as_str()))
                    {
                        delay_for_agent = Some(delay);
                    } else if group_agents.iter().any(|ua| ua == "*") {
                        delay_for_wildcard = Some(delay);
                    }
                }
                _ => in_agent_lines = false,
            }
        }

        delay_for_agent.or(delay_for_wildcard)
    }

    /// Returns the URLs of all `Sitemap:` directives, in file order
    pub fn sitemaps(&self) -> Vec<String> {
        directives(&self.content)
            .filter(|(key, value)| key == "sitemap" && !value.is_empty())
            .map(|(_, value)| value.to_string())
            .collect()
    }

    /// Returns true if the file has at least one group and every directive
    /// line is one robots.txt parsers recognize
    pub fn is_valid(&self) -> bool {
        if self.allow_all {
            return true;
        }

        let mut saw_agent = false;
        let mut line_count = 0;
        for line in self.content.lines() {
            let trimmed = strip_comment(line).trim();
            if trimmed.is_empty() {
                continue;
            }
            line_count += 1;
            let Some((key, _)) = trimmed.split_once(':') else {
                return false;
            };
            let key = key.trim().to_lowercase();
            if !KNOWN_DIRECTIVES.contains(&key.as_str()) {
                return false;
            }
            if key == "user-agent" {
                saw_agent = true;
            }
        }

        line_count == 0 || saw_agent
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Iterates `(lowercased key, trimmed value)` pairs, skipping comments
fn directives(content: &str) -> impl Iterator<Item = (String, &str)> {
    content.lines().filter_map(|line| {
        let trimmed = strip_comment(line).trim();
        let (key, value) = trimmed.split_once(':')?;
        Some((key.trim().to_lowercase(), value.trim()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com";

    fn url(path: &str) -> String {
        format!("{}{}", BASE, path)
    }

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed(&url("/any/path"), "TestBot"));
        assert!(robots.is_allowed(&url("/admin"), "TestBot"));
    }

    #[test]
    fn test_parse_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed(&url("/"), "TestBot"));
        assert!(!robots.is_allowed(&url("/page"), "TestBot"));
    }

    #[test]
    fn test_parse_disallow_directory() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private/");
        assert!(robots.is_allowed(&url("/"), "TestBot"));
        assert!(robots.is_allowed(&url("/public"), "TestBot"));
        assert!(!robots.is_allowed(&url("/private/"), "TestBot"));
        assert!(!robots.is_allowed(&url("/private/secret"), "TestBot"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(!robots.is_allowed(&url("/private"), "TestBot"));
        assert!(robots.is_allowed(&url("/private/public"), "TestBot"));
    }

    #[test]
    fn test_parse_specific_user_agent() {
        let robots =
            ParsedRobots::from_content("User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(robots.is_allowed(&url("/page"), "GoodBot"));
        assert!(!robots.is_allowed(&url("/page"), "BadBot"));
    }

    #[test]
    fn test_empty_robots_txt() {
        let robots = ParsedRobots::from_content("");
        assert!(robots.is_allowed(&url("/any/path"), "TestBot"));
        assert!(robots.is_valid());
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("TestBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent() {
        let robots = ParsedRobots::from_content(
            "User-agent: TestBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10",
        );
        assert_eq!(robots.crawl_delay("TestBot"), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_after_disallow_lines() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nDisallow: /tmp\nCrawl-delay: 2.5\n\nUser-agent: Other\nCrawl-delay: 9",
        );
        assert_eq!(robots.crawl_delay("TestBot"), Some(2.5));
    }

    #[test]
    fn test_crawl_delay_multiple_user_agents() {
        let robots = ParsedRobots::from_content("User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3");
        assert_eq!(robots.crawl_delay("BotA"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotB"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_case_insensitive() {
        let robots = ParsedRobots::from_content("User-agent: TestBot\ncrawl-delay: 7");
        assert_eq!(robots.crawl_delay("testbot"), Some(7.0));
    }

    #[test]
    fn test_sitemaps() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nDisallow:\nSitemap: https://example.com/sitemap.xml\n# Sitemap: https://example.com/old.xml\nsitemap: https://example.com/news.xml",
        );
        assert_eq!(
            robots.sitemaps(),
            vec![
                "https://example.com/sitemap.xml".to_string(),
                "https://example.com/news.xml".to_string()
            ]
        );
    }

    #[test]
    fn test_validity() {
        assert!(ParsedRobots::from_content("User-agent: *\nDisallow: /x # comment").is_valid());
        assert!(!ParsedRobots::from_content("This is not valid robots.txt {{{").is_valid());
        assert!(!ParsedRobots::from_content("Disallow: /").is_valid());
        assert!(!ParsedRobots::from_content("<html><body>404</body></html>").is_valid());
    }
}
