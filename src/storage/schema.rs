//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the seo-audit database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One audit of one root URL
CREATE TABLE IF NOT EXISTS websites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_url TEXT NOT NULL,
    max_pages INTEGER NOT NULL,
    max_depth INTEGER NOT NULL,
    language TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    status TEXT NOT NULL,
    overall_score REAL,
    created_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_websites_fingerprint ON websites(fingerprint);

-- Terminal page outcomes
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    website_id INTEGER NOT NULL REFERENCES websites(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    status_code INTEGER,
    depth INTEGER NOT NULL,
    discovery_order INTEGER NOT NULL,
    title TEXT,
    meta_description TEXT,
    text_content TEXT NOT NULL DEFAULT '',
    meta_json TEXT NOT NULL DEFAULT '{}',
    error_reason TEXT,
    fetched_at TEXT NOT NULL,
    UNIQUE(website_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_website ON pages(website_id);
CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(website_id, status);

-- Outgoing hyperlinks, internal and external
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    target_url TEXT NOT NULL,
    anchor_text TEXT NOT NULL DEFAULT '',
    is_internal INTEGER NOT NULL,
    nofollow INTEGER NOT NULL DEFAULT 0,
    UNIQUE(source_page_id, target_url)
);

CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_page_id);
CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_url);

-- Per-page keywords from text analysis
CREATE TABLE IF NOT EXISTS keywords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    term TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    density REAL NOT NULL,
    UNIQUE(page_id, term)
);

CREATE INDEX IF NOT EXISTS idx_keywords_page ON keywords(page_id);

-- Technical check categories per website
CREATE TABLE IF NOT EXISTS technical_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    website_id INTEGER NOT NULL REFERENCES websites(id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    score REAL NOT NULL,
    passed INTEGER NOT NULL,
    details_json TEXT NOT NULL,
    UNIQUE(website_id, category)
);

-- Cached audit results and failure cool-downs, keyed by audit fingerprint
CREATE TABLE IF NOT EXISTS audit_cache (
    fingerprint TEXT PRIMARY KEY,
    root_url TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    ttl_seconds INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_cache_root ON audit_cache(root_url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
