//! Audit result cache and per-fingerprint deduplication
//!
//! The cache maps an audit fingerprint to a finished [`AuditResult`]. A hit
//! within the TTL short-circuits the whole pipeline. Terminal failures may
//! be cached for a short cool-down so a dead site is not hammered.
//!
//! [`CacheManager::claim`] guarantees at most one running audit per
//! fingerprint in this process: a second claim fails with `Busy` until the
//! first claim's guard is dropped.

mod fingerprint;
mod store;

pub use fingerprint::fingerprint;
pub use store::{CacheEntry, CacheStore, EntryKind, SqliteCacheStore};

use crate::report::AuditResult;
use crate::storage::StorageError;
use crate::{AuditError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A terminal audit failure as it is kept during the cool-down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedFailure {
    Network { url: String, message: String },
    Parse { url: String, message: String },
    RootDisallowed { url: String },
}

impl CachedFailure {
    /// Returns the cacheable form of an error, if it is a site failure
    ///
    /// Busy, cancellation, timeout and internal errors are never cached.
    pub fn from_error(error: &AuditError) -> Option<Self> {
        match error {
            AuditError::Network { url, message } => Some(Self::Network {
                url: url.clone(),
                message: message.clone(),
            }),
            AuditError::Parse { url, message } => Some(Self::Parse {
                url: url.clone(),
                message: message.clone(),
            }),
            AuditError::RootDisallowed { url } => Some(Self::RootDisallowed { url: url.clone() }),
            _ => None,
        }
    }

    pub fn into_error(self) -> AuditError {
        match self {
            Self::Network { url, message } => AuditError::Network { url, message },
            Self::Parse { url, message } => AuditError::Parse { url, message },
            Self::RootDisallowed { url } => AuditError::RootDisallowed { url },
        }
    }
}

/// Outcome of a cache lookup
#[derive(Debug)]
pub enum CacheLookup {
    Hit(Box<AuditResult>),
    /// A recent terminal failure; the audit should fail without fetching
    CoolingDown(CachedFailure),
    Miss,
}

/// Releases a fingerprint claim when dropped
#[derive(Debug)]
pub struct FingerprintClaim {
    manager: Arc<CacheManager>,
    fingerprint: String,
}

impl FingerprintClaim {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl Drop for FingerprintClaim {
    fn drop(&mut self) {
        self.manager.lock_in_flight().remove(&self.fingerprint);
        tracing::debug!("Released audit claim {}", self.fingerprint);
    }
}

/// Cache and in-flight registry shared by all audits of a process
pub struct CacheManager {
    store: Mutex<Box<dyn CacheStore + Send>>,
    in_flight: Mutex<HashSet<String>>,
    ttl: Duration,
    failure_cooldown: Duration,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("ttl", &self.ttl)
            .field("failure_cooldown", &self.failure_cooldown)
            .finish_non_exhaustive()
    }
}

fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

impl CacheManager {
    pub fn new(store: Box<dyn CacheStore + Send>, ttl: Duration, failure_cooldown: Duration) -> Self {
        Self {
            store: Mutex::new(store),
            in_flight: Mutex::new(HashSet::new()),
            ttl,
            failure_cooldown,
        }
    }

    /// Opens the cache table of the audit database
    pub fn open(path: &Path, ttl: Duration, failure_cooldown: Duration) -> Result<Self> {
        let store = SqliteCacheStore::open(path)?;
        Ok(Self::new(Box::new(store), ttl, failure_cooldown))
    }

    pub fn in_memory(ttl: Duration, failure_cooldown: Duration) -> Result<Self> {
        let store = SqliteCacheStore::open_in_memory()?;
        Ok(Self::new(Box::new(store), ttl, failure_cooldown))
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, Box<dyn CacheStore + Send>>> {
        self.store
            .lock()
            .map_err(|_| AuditError::Storage(StorageError::Poisoned))
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up a fingerprint; expired entries are dropped and count as a miss
    pub fn get(&self, fingerprint: &str) -> Result<CacheLookup> {
        let mut store = self.lock_store()?;
        let Some(entry) = store.get(fingerprint)? else {
            return Ok(CacheLookup::Miss);
        };

        if entry.is_expired(Utc::now()) {
            tracing::debug!("Cache entry {} expired", fingerprint);
            store.remove(fingerprint)?;
            return Ok(CacheLookup::Miss);
        }

        match entry.kind {
            EntryKind::Result => match serde_json::from_str::<AuditResult>(&entry.payload) {
                Ok(result) => Ok(CacheLookup::Hit(Box::new(result))),
                Err(e) => {
                    tracing::warn!("Dropping unreadable cache entry {}: {}", fingerprint, e);
                    store.remove(fingerprint)?;
                    Ok(CacheLookup::Miss)
                }
            },
            EntryKind::Failure => match serde_json::from_str::<CachedFailure>(&entry.payload) {
                Ok(failure) => Ok(CacheLookup::CoolingDown(failure)),
                Err(e) => {
                    tracing::warn!("Dropping unreadable cache entry {}: {}", fingerprint, e);
                    store.remove(fingerprint)?;
                    Ok(CacheLookup::Miss)
                }
            },
        }
    }

    /// Stores a finished result under its fingerprint with the default TTL
    pub fn put(&self, fingerprint: &str, root_url: &str, result: &AuditResult) -> Result<()> {
        self.put_with_ttl(fingerprint, root_url, result, self.ttl)
    }

    pub fn put_with_ttl(
        &self,
        fingerprint: &str,
        root_url: &str,
        result: &AuditResult,
        ttl: Duration,
    ) -> Result<()> {
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            root_url: root_url.to_string(),
            kind: EntryKind::Result,
            payload: serde_json::to_string(result)?,
            created_at: Utc::now(),
            ttl_seconds: seconds(ttl),
        };
        self.lock_store()?.put(&entry)?;
        tracing::debug!("Cached audit result {} for {:?}", fingerprint, ttl);
        Ok(())
    }

    /// Remembers a terminal failure for the cool-down; a no-op when disabled
    pub fn put_failure(
        &self,
        fingerprint: &str,
        root_url: &str,
        failure: &CachedFailure,
    ) -> Result<()> {
        if self.failure_cooldown.is_zero() {
            return Ok(());
        }
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            root_url: root_url.to_string(),
            kind: EntryKind::Failure,
            payload: serde_json::to_string(failure)?,
            created_at: Utc::now(),
            ttl_seconds: seconds(self.failure_cooldown),
        };
        self.lock_store()?.put(&entry)?;
        Ok(())
    }

    /// Removes every entry matching the predicate
    ///
    /// # Returns
    ///
    /// The number of entries removed
    pub fn invalidate<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let mut store = self.lock_store()?;
        let mut removed = 0;
        for entry in store.list()?.iter().filter(|e| predicate(e)) {
            if store.remove(&entry.fingerprint)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.lock_store()?.list()?)
    }

    pub fn clear(&self) -> Result<usize> {
        Ok(self.lock_store()?.clear()?)
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.lock_store()?.purge_expired(now)?)
    }

    /// Claims a fingerprint for one running audit
    ///
    /// # Errors
    ///
    /// `Busy` if another audit already holds the claim.
    pub fn claim(self: &Arc<Self>, fingerprint: &str) -> Result<FingerprintClaim> {
        if !self.lock_in_flight().insert(fingerprint.to_string()) {
            return Err(AuditError::Busy {
                fingerprint: fingerprint.to_string(),
            });
        }
        tracing::debug!("Claimed audit {}", fingerprint);
        Ok(FingerprintClaim {
            manager: Arc::clone(self),
            fingerprint: fingerprint.to_string(),
        })
    }

    pub fn is_in_flight(&self, fingerprint: &str) -> bool {
        self.lock_in_flight().contains(fingerprint)
    }
}
