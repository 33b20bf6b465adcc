//! Storage module for persisting audit data
//!
//! This module handles all database operations for an audit, including:
//! - SQLite database initialization and schema management
//! - Website (one audit of one root URL) lifecycle
//! - Page records with their extracted SEO metadata
//! - Link edges, per-page keywords and technical category results

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStorage;
pub(crate) use sqlite::parse_timestamp;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{AuditStatus, PageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage shared between crawl workers and the analysis stage
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Opens (or creates) the SQLite database and wraps it for sharing
pub fn open_storage(path: &Path) -> StorageResult<SharedStorage> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Parameters a website row is created with
#[derive(Debug, Clone)]
pub struct WebsiteParams {
    pub root_url: String,
    pub max_pages: u32,
    pub max_depth: u32,
    pub language: String,
    pub fingerprint: String,
}

/// One audit of one root URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteRecord {
    pub id: i64,
    pub root_url: String,
    pub max_pages: u32,
    pub max_depth: u32,
    pub language: String,
    pub fingerprint: String,
    pub status: AuditStatus,
    pub overall_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A heading element in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// An `<img>` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    /// None when the attribute is absent; Some("") for decorative images
    pub alt: Option<String>,
}

/// SEO metadata extracted from a page, stored as a JSON column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMeta {
    pub canonical: Option<String>,
    pub meta_robots: Option<String>,
    pub viewport: Option<String>,
    pub lang: Option<String>,
    pub headings: Vec<Heading>,
    pub images: Vec<ImageRef>,
    pub open_graph: BTreeMap<String, String>,
    pub twitter: BTreeMap<String, String>,
    pub has_structured_data: bool,
    pub content_type: Option<String>,
    pub final_url: Option<String>,
    pub redirected: bool,
    pub response_time_ms: Option<u64>,
    pub body_bytes: usize,
    pub hsts: bool,
}

impl PageMeta {
    pub fn h1s(&self) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(|h| h.level == 1)
    }
}

/// A terminal page outcome ready to be persisted
#[derive(Debug, Clone)]
pub struct NewPage {
    pub url: String,
    pub status: PageStatus,
    pub status_code: Option<u16>,
    pub depth: u32,
    pub discovery_order: u32,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub text: String,
    pub meta: PageMeta,
    pub error_reason: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// A persisted page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: i64,
    pub website_id: i64,
    pub url: String,
    pub status: PageStatus,
    pub status_code: Option<u16>,
    pub depth: u32,
    pub discovery_order: u32,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub text: String,
    pub meta: PageMeta,
    pub error_reason: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    pub fn is_parsed(&self) -> bool {
        self.status == PageStatus::Parsed
    }
}

/// An outgoing hyperlink of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub target_url: String,
    pub anchor_text: String,
    pub is_internal: bool,
    pub nofollow: bool,
}

/// A link together with the page it was found on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLink {
    pub source_page_id: i64,
    pub link: LinkRecord,
}

/// A keyword extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub term: String,
    pub frequency: u32,
    pub density: f64,
}

/// Outcome of one technical check category
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalRecord {
    pub category: String,
    pub score: f64,
    pub passed: bool,
    pub details_json: String,
}
