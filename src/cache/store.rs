//! Cache entry persistence
//!
//! Entries live in the `audit_cache` table of the audit database, next to
//! the website and page tables.

use crate::storage::{initialize_schema, StorageResult};
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A serialized `AuditResult`
    Result,
    /// A serialized terminal failure, kept for the cool-down
    Failure,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Result => "result",
            Self::Failure => "failure",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "result" => Some(Self::Result),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub root_url: String,
    pub kind: EntryKind,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.ttl_seconds)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Backing store of the cache manager
pub trait CacheStore {
    fn get(&self, fingerprint: &str) -> StorageResult<Option<CacheEntry>>;

    /// Inserts or replaces the entry for its fingerprint
    fn put(&mut self, entry: &CacheEntry) -> StorageResult<()>;

    fn remove(&mut self, fingerprint: &str) -> StorageResult<bool>;

    /// All entries, newest first
    fn list(&self) -> StorageResult<Vec<CacheEntry>>;

    fn clear(&mut self) -> StorageResult<usize>;

    fn purge_expired(&mut self, now: DateTime<Utc>) -> StorageResult<usize>;
}

const ENTRY_COLUMNS: &str = "fingerprint, root_url, kind, payload, created_at, ttl_seconds";

/// SQLite-backed cache store
pub struct SqliteCacheStore {
    conn: Connection,
}

impl SqliteCacheStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let kind: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    Ok(CacheEntry {
        fingerprint: row.get(0)?,
        root_url: row.get(1)?,
        kind: EntryKind::from_db_string(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown cache entry kind {}", kind).into(),
            )
        })?,
        payload: row.get(3)?,
        created_at: crate::storage::parse_timestamp(4, &created_at)?,
        ttl_seconds: row.get(5)?,
    })
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, fingerprint: &str) -> StorageResult<Option<CacheEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM audit_cache WHERE fingerprint = ?1",
                    ENTRY_COLUMNS
                ),
                [fingerprint],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn put(&mut self, entry: &CacheEntry) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO audit_cache ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                ENTRY_COLUMNS
            ),
            params![
                entry.fingerprint,
                entry.root_url,
                entry.kind.as_str(),
                entry.payload,
                entry.created_at.to_rfc3339(),
                entry.ttl_seconds,
            ],
        )?;
        Ok(())
    }

    fn remove(&mut self, fingerprint: &str) -> StorageResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM audit_cache WHERE fingerprint = ?1", [fingerprint])?;
        Ok(removed > 0)
    }

    fn list(&self) -> StorageResult<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM audit_cache ORDER BY created_at DESC, fingerprint",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn clear(&mut self) -> StorageResult<usize> {
        Ok(self.conn.execute("DELETE FROM audit_cache", [])?)
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> StorageResult<usize> {
        // Expiry depends on each row's TTL, so it is decided in Rust
        let expired: Vec<String> = self
            .list()?
            .into_iter()
            .filter(|e| e.is_expired(now))
            .map(|e| e.fingerprint)
            .collect();

        let tx = self.conn.transaction()?;
        for fingerprint in &expired {
            tx.execute("DELETE FROM audit_cache WHERE fingerprint = ?1", [fingerprint])?;
        }
        tx.commit()?;
        Ok(expired.len())
    }
}
