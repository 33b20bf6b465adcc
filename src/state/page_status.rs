/// Page status definitions for tracking crawl progress
///
/// Every URL moves through `Discovered -> Fetching -> {Parsed, Failed, Skipped}`.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a page in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    // ===== Active States =====
    /// Page has been discovered and sits in the frontier
    Discovered,

    /// Page is currently being fetched
    Fetching,

    // ===== Terminal States =====
    /// Page was fetched and its HTML extracted
    Parsed,

    /// Page fetch or parse failed after retries
    Failed,

    /// Page was never fetched (robots.txt, non-HTML content)
    Skipped,
}

impl PageStatus {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Parsed | Self::Failed | Self::Skipped)
    }

    /// Returns true if the transition follows the crawl state machine
    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Fetching)
                | (Self::Discovered, Self::Skipped)
                | (Self::Fetching, Self::Parsed)
                | (Self::Fetching, Self::Failed)
                | (Self::Fetching, Self::Skipped)
        )
    }

    /// Converts the page status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Fetching => "fetching",
            Self::Parsed => "parsed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a page status from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "fetching" => Some(Self::Fetching),
            "parsed" => Some(Self::Parsed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns all possible page statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Discovered,
            Self::Fetching,
            Self::Parsed,
            Self::Failed,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
