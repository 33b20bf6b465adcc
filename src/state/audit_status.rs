use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of one audit of a website
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Crawl or analysis in progress
    Running,
    /// Every crawled page was parsed and all analyses ran
    Success,
    /// Analyses ran, but some pages failed or the audit hit its timeout
    PartialSuccess,
    /// The audit could not produce a result
    Failed,
    /// The caller cancelled the audit
    Cancelled,
}

impl AuditStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if the audit produced a usable result
    pub fn has_result(&self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "partial_success" => Some(Self::PartialSuccess),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
