//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{AuditStatus, PageStatus};
use crate::storage::{
    KeywordRecord, LinkRecord, NewPage, PageRecord, StoredLink, TechnicalRecord, WebsiteParams,
    WebsiteRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Website not found: {0}")]
    WebsiteNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Callers share one backend behind a mutex; every method is short and
/// never awaits.
pub trait Storage {
    // ===== Website Management =====

    /// Creates a website row in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created website
    fn create_website(&mut self, params: &WebsiteParams) -> StorageResult<i64>;

    /// Gets a website by ID
    fn get_website(&self, website_id: i64) -> StorageResult<WebsiteRecord>;

    /// Moves a website to its final status, stamping the finish time
    fn finish_website(
        &mut self,
        website_id: i64,
        status: AuditStatus,
        overall_score: Option<f64>,
    ) -> StorageResult<()>;

    // ===== Page Management =====

    /// Inserts a page, or replaces the row with the same `(website, url)`
    ///
    /// # Returns
    ///
    /// The page ID
    fn upsert_page(&mut self, website_id: i64, page: &NewPage) -> StorageResult<i64>;

    /// Adds an outgoing link to a page; duplicates of the same target are ignored
    fn add_link(&mut self, page_id: i64, link: &LinkRecord) -> StorageResult<()>;

    /// Upserts a page and its links in one transaction
    fn record_page(
        &mut self,
        website_id: i64,
        page: &NewPage,
        links: &[LinkRecord],
    ) -> StorageResult<i64>;

    /// Gets all pages of a website in discovery order
    fn get_pages(&self, website_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Counts pages of a website in a given status
    fn count_pages_by_status(&self, website_id: i64, status: PageStatus) -> StorageResult<u64>;

    // ===== Links =====

    /// Gets all links found on pages of a website
    fn get_links(&self, website_id: i64) -> StorageResult<Vec<StoredLink>>;

    // ===== Analysis Results =====

    /// Replaces the keywords of a page
    fn bulk_upsert_keywords(
        &mut self,
        page_id: i64,
        keywords: &[KeywordRecord],
    ) -> StorageResult<()>;

    /// Gets the keywords of a page, most frequent first
    fn get_keywords(&self, page_id: i64) -> StorageResult<Vec<KeywordRecord>>;

    /// Replaces the technical category results of a website
    fn save_technical_results(
        &mut self,
        website_id: i64,
        results: &[TechnicalRecord],
    ) -> StorageResult<()>;

    /// Gets the technical category results of a website
    fn get_technical_results(&self, website_id: i64) -> StorageResult<Vec<TechnicalRecord>>;
}
