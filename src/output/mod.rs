//! Output module for rendering audit results
//!
//! This module handles:
//! - Markdown reports of a finished audit
//! - JSON export of the full [`AuditResult`](crate::report::AuditResult)
//! - Console summaries of audits, stored pages and cache entries

mod json;
mod markdown;
pub mod stats;

pub use json::{to_json, write_json};
pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::{load_page_statistics, print_audit_summary, print_cache_entries, PageStatistics};

use thiserror::Error;

/// Errors raised while writing a report
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type OutputResult<T> = Result<T, OutputError>;
