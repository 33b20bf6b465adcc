//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{AuditStatus, PageStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    KeywordRecord, LinkRecord, NewPage, PageMeta, PageRecord, StoredLink, TechnicalRecord,
    WebsiteParams, WebsiteRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const PAGE_COLUMNS: &str = "id, website_id, url, status, status_code, depth, discovery_order,
     title, meta_description, text_content, meta_json, error_reason, fetched_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn website_from_row(row: &Row<'_>) -> rusqlite::Result<WebsiteRecord> {
    let finished_at: Option<String> = row.get(9)?;
    Ok(WebsiteRecord {
        id: row.get(0)?,
        root_url: row.get(1)?,
        max_pages: row.get(2)?,
        max_depth: row.get(3)?,
        language: row.get(4)?,
        fingerprint: row.get(5)?,
        status: AuditStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(AuditStatus::Failed),
        overall_score: row.get(7)?,
        created_at: parse_timestamp(8, &row.get::<_, String>(8)?)?,
        finished_at: finished_at
            .as_deref()
            .map(|s| parse_timestamp(9, s))
            .transpose()?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let meta_json: String = row.get(10)?;
    let meta: PageMeta = serde_json::from_str(&meta_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(PageRecord {
        id: row.get(0)?,
        website_id: row.get(1)?,
        url: row.get(2)?,
        status: PageStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(PageStatus::Failed),
        status_code: row.get(4)?,
        depth: row.get(5)?,
        discovery_order: row.get(6)?,
        title: row.get(7)?,
        meta_description: row.get(8)?,
        text: row.get(9)?,
        meta,
        error_reason: row.get(11)?,
        fetched_at: parse_timestamp(12, &row.get::<_, String>(12)?)?,
    })
}

fn upsert_page_on(conn: &Connection, website_id: i64, page: &NewPage) -> StorageResult<i64> {
    let meta_json = serde_json::to_string(&page.meta)?;
    conn.execute(
        "INSERT INTO pages (website_id, url, status, status_code, depth, discovery_order,
             title, meta_description, text_content, meta_json, error_reason, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(website_id, url) DO UPDATE SET
             status = excluded.status,
             status_code = excluded.status_code,
             depth = MIN(depth, excluded.depth),
             title = excluded.title,
             meta_description = excluded.meta_description,
             text_content = excluded.text_content,
             meta_json = excluded.meta_json,
             error_reason = excluded.error_reason,
             fetched_at = excluded.fetched_at",
        params![
            website_id,
            page.url,
            page.status.to_db_string(),
            page.status_code,
            page.depth,
            page.discovery_order,
            page.title,
            page.meta_description,
            page.text,
            meta_json,
            page.error_reason,
            page.fetched_at.to_rfc3339(),
        ],
    )?;

    let id = conn.query_row(
        "SELECT id FROM pages WHERE website_id = ?1 AND url = ?2",
        params![website_id, page.url],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn add_link_on(conn: &Connection, page_id: i64, link: &LinkRecord) -> StorageResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO links (source_page_id, target_url, anchor_text, is_internal, nofollow)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            page_id,
            link.target_url,
            link.anchor_text,
            link.is_internal,
            link.nofollow
        ],
    )?;
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Website Management =====

    fn create_website(&mut self, params: &WebsiteParams) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO websites (root_url, max_pages, max_depth, language, fingerprint, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                params.root_url,
                params.max_pages,
                params.max_depth,
                params.language,
                params.fingerprint,
                AuditStatus::Running.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_website(&self, website_id: i64) -> StorageResult<WebsiteRecord> {
        self.conn
            .query_row(
                "SELECT id, root_url, max_pages, max_depth, language, fingerprint, status,
                 overall_score, created_at, finished_at FROM websites WHERE id = ?1",
                params![website_id],
                website_from_row,
            )
            .optional()?
            .ok_or(StorageError::WebsiteNotFound(website_id))
    }

    fn finish_website(
        &mut self,
        website_id: i64,
        status: AuditStatus,
        overall_score: Option<f64>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE websites SET status = ?1, overall_score = ?2, finished_at = ?3 WHERE id = ?4",
            params![status.to_db_string(), overall_score, now, website_id],
        )?;
        if updated == 0 {
            return Err(StorageError::WebsiteNotFound(website_id));
        }
        Ok(())
    }

    // ===== Page Management =====

    fn upsert_page(&mut self, website_id: i64, page: &NewPage) -> StorageResult<i64> {
        upsert_page_on(&self.conn, website_id, page)
    }

    fn add_link(&mut self, page_id: i64, link: &LinkRecord) -> StorageResult<()> {
        add_link_on(&self.conn, page_id, link)
    }

    fn record_page(
        &mut self,
        website_id: i64,
        page: &NewPage,
        links: &[LinkRecord],
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;
        let page_id = upsert_page_on(&tx, website_id, page)?;
        for link in links {
            add_link_on(&tx, page_id, link)?;
        }
        tx.commit()?;
        Ok(page_id)
    }

    fn get_pages(&self, website_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE website_id = ?1 ORDER BY discovery_order, id",
            PAGE_COLUMNS
        ))?;

        let pages = stmt
            .query_map(params![website_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn count_pages_by_status(&self, website_id: i64, status: PageStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE website_id = ?1 AND status = ?2",
            params![website_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Links =====

    fn get_links(&self, website_id: i64) -> StorageResult<Vec<StoredLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.source_page_id, l.target_url, l.anchor_text, l.is_internal, l.nofollow
             FROM links l JOIN pages p ON p.id = l.source_page_id
             WHERE p.website_id = ?1
             ORDER BY l.id",
        )?;

        let links = stmt
            .query_map(params![website_id], |row| {
                Ok(StoredLink {
                    source_page_id: row.get(0)?,
                    link: LinkRecord {
                        target_url: row.get(1)?,
                        anchor_text: row.get(2)?,
                        is_internal: row.get(3)?,
                        nofollow: row.get(4)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    // ===== Analysis Results =====

    fn bulk_upsert_keywords(
        &mut self,
        page_id: i64,
        keywords: &[KeywordRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM keywords WHERE page_id = ?1", params![page_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO keywords (page_id, term, frequency, density) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(page_id, term) DO UPDATE SET
                     frequency = excluded.frequency,
                     density = excluded.density",
            )?;
            for keyword in keywords {
                stmt.execute(params![
                    page_id,
                    keyword.term,
                    keyword.frequency,
                    keyword.density
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_keywords(&self, page_id: i64) -> StorageResult<Vec<KeywordRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT term, frequency, density FROM keywords WHERE page_id = ?1
             ORDER BY frequency DESC, term",
        )?;

        let keywords = stmt
            .query_map(params![page_id], |row| {
                Ok(KeywordRecord {
                    term: row.get(0)?,
                    frequency: row.get(1)?,
                    density: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keywords)
    }

    fn save_technical_results(
        &mut self,
        website_id: i64,
        results: &[TechnicalRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM technical_results WHERE website_id = ?1",
            params![website_id],
        )?;
        for result in results {
            tx.execute(
                "INSERT INTO technical_results (website_id, category, score, passed, details_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    website_id,
                    result.category,
                    result.score,
                    result.passed,
                    result.details_json
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_technical_results(&self, website_id: i64) -> StorageResult<Vec<TechnicalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, score, passed, details_json FROM technical_results
             WHERE website_id = ?1 ORDER BY id",
        )?;

        let results = stmt
            .query_map(params![website_id], |row| {
                Ok(TechnicalRecord {
                    category: row.get(0)?,
                    score: row.get(1)?,
                    passed: row.get(2)?,
                    details_json: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn website_params() -> WebsiteParams {
        WebsiteParams {
            root_url: "https://example.com/".to_string(),
            max_pages: 10,
            max_depth: 2,
            language: "auto".to_string(),
            fingerprint: "abc123".to_string(),
        }
    }

    fn new_page(url: &str, order: u32, status: PageStatus) -> NewPage {
        NewPage {
            url: url.to_string(),
            status,
            status_code: Some(200),
            depth: if order == 0 { 0 } else { 1 },
            discovery_order: order,
            title: Some("Title".to_string()),
            meta_description: None,
            text: "hello world".to_string(),
            meta: PageMeta::default(),
            error_reason: None,
            fetched_at: Utc::now(),
        }
    }

    fn link(target: &str) -> LinkRecord {
        LinkRecord {
            target_url: target.to_string(),
            anchor_text: "go".to_string(),
            is_internal: true,
            nofollow: false,
        }
    }

    #[test]
    fn test_create_and_finish_website() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let id = storage.create_website(&website_params()).unwrap();

        let website = storage.get_website(id).unwrap();
        assert_eq!(website.status, AuditStatus::Running);
        assert!(website.finished_at.is_none());

        storage
            .finish_website(id, AuditStatus::Success, Some(81.5))
            .unwrap();
        let website = storage.get_website(id).unwrap();
        assert_eq!(website.status, AuditStatus::Success);
        assert_eq!(website.overall_score, Some(81.5));
        assert!(website.finished_at.is_some());
    }

    #[test]
    fn test_missing_website() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(matches!(
            storage.get_website(42),
            Err(StorageError::WebsiteNotFound(42))
        ));
    }

    #[test]
    fn test_upsert_page_is_unique_per_url() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let website = storage.create_website(&website_params()).unwrap();

        let first = storage
            .upsert_page(website, &new_page("https://example.com/", 0, PageStatus::Parsed))
            .unwrap();
        let second = storage
            .upsert_page(website, &new_page("https://example.com/", 0, PageStatus::Parsed))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.get_pages(website).unwrap().len(), 1);
    }

    #[test]
    fn test_record_page_with_links() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let website = storage.create_website(&website_params()).unwrap();

        let page_id = storage
            .record_page(
                website,
                &new_page("https://example.com/", 0, PageStatus::Parsed),
                &[
                    link("https://example.com/a"),
                    link("https://example.com/b"),
                    link("https://example.com/a"),
                ],
            )
            .unwrap();

        let links = storage.get_links(website).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.source_page_id == page_id));
    }

    #[test]
    fn test_pages_come_back_in_discovery_order_with_meta() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let website = storage.create_website(&website_params()).unwrap();

        let mut about = new_page("https://example.com/about", 2, PageStatus::Parsed);
        about.meta.canonical = Some("https://example.com/about".to_string());
        storage.upsert_page(website, &about).unwrap();
        storage
            .upsert_page(website, &new_page("https://example.com/", 0, PageStatus::Parsed))
            .unwrap();
        storage
            .upsert_page(website, &new_page("https://example.com/x.pdf", 1, PageStatus::Skipped))
            .unwrap();

        let pages = storage.get_pages(website).unwrap();
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/x.pdf",
                "https://example.com/about"
            ]
        );
        assert_eq!(
            pages[2].meta.canonical.as_deref(),
            Some("https://example.com/about")
        );
        assert_eq!(
            storage
                .count_pages_by_status(website, PageStatus::Parsed)
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_keywords_are_replaced() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let website = storage.create_website(&website_params()).unwrap();
        let page = storage
            .upsert_page(website, &new_page("https://example.com/", 0, PageStatus::Parsed))
            .unwrap();

        let kw = |term: &str, frequency| KeywordRecord {
            term: term.to_string(),
            frequency,
            density: 1.0,
        };
        storage
            .bulk_upsert_keywords(page, &[kw("rust", 3), kw("crawl", 5)])
            .unwrap();
        storage.bulk_upsert_keywords(page, &[kw("audit", 2)]).unwrap();

        let keywords = storage.get_keywords(page).unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].term, "audit");
    }

    #[test]
    fn test_technical_results_roundtrip() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let website = storage.create_website(&website_params()).unwrap();

        storage
            .save_technical_results(
                website,
                &[TechnicalRecord {
                    category: "https".to_string(),
                    score: 100.0,
                    passed: true,
                    details_json: "[]".to_string(),
                }],
            )
            .unwrap();

        let results = storage.get_technical_results(website).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
    }
}
