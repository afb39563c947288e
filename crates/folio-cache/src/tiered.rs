//! Two-tier TTL cache: an in-memory hot tier backed by a disk snapshot.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

use crate::config::CacheConfig;
use crate::key::CacheKey;
use crate::snapshot::SnapshotFile;

/// A cached value and its expiry.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub(crate) value: Value,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) persisted: bool,
}

impl CacheEntry {
    pub(crate) const fn durable(value: Value, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at,
            persisted: true,
        }
    }

    pub(crate) const fn volatile(value: Value, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at,
            persisted: false,
        }
    }

    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Entry counts and location, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently held in the hot tier, expired or not.
    pub total_entries: usize,
    /// Entries that would be returned by a read.
    pub valid_entries: usize,
    /// Entries past their expiry, awaiting lazy eviction.
    pub expired_entries: usize,
    /// Valid entries that are part of the disk snapshot.
    pub persisted_entries: usize,
    /// Snapshot file, if the cache has a disk tier.
    pub location: Option<PathBuf>,
    /// When these stats were taken.
    pub generated_at: DateTime<Utc>,
}

/// Process-local key/value cache with expiring entries.
///
/// Reads only consult the hot tier; the disk snapshot is loaded once, in
/// [`TieredCache::open`]. Entries set with a persist hint and a TTL above the
/// configured threshold are written to the snapshot so they survive a restart.
///
/// A single mutex guards the hot tier and snapshot writes. No operation
/// returns an error: disk failures are logged and the cache keeps serving
/// from memory.
#[derive(Debug)]
pub struct TieredCache {
    hot: Mutex<HashMap<String, CacheEntry>>,
    snapshot: Option<SnapshotFile>,
    persist_threshold: Duration,
}

impl TieredCache {
    /// Opens a cache backed by the snapshot described in `config`.
    ///
    /// Unexpired snapshot entries are admitted into the hot tier. A missing,
    /// unreadable or corrupt snapshot starts the cache empty.
    pub fn open(config: CacheConfig) -> Self {
        if let Err(e) = std::fs::create_dir_all(&config.dir) {
            warn!(
                dir = %config.dir.display(),
                error = %e,
                "Could not create cache directory, snapshot writes will fail"
            );
        }
        let snapshot = SnapshotFile::new(config.snapshot_path());
        let hot = snapshot.load(Utc::now());

        Self {
            hot: Mutex::new(hot),
            snapshot: Some(snapshot),
            persist_threshold: config.persist_threshold,
        }
    }

    /// Creates a cache without a disk tier.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            hot: Mutex::new(HashMap::new()),
            snapshot: None,
            persist_threshold: CacheConfig::default().persist_threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.hot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the raw cached value, or `None` if missing or expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get_json(&self, key: &str) -> Option<Value> {
        let now = Utc::now();
        let mut hot = self.lock();
        match hot.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                hot.remove(key);
                trace!(key = %truncate(key), "Evicted expired entry");
                None
            }
            None => None,
        }
    }

    /// Returns the cached value decoded as `T`.
    ///
    /// A value that does not decode as `T` reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_json(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key = %truncate(key), error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Stores a raw value with `expires_at = now + ttl`.
    ///
    /// With `persist_hint` and a TTL above the persistence threshold, the
    /// snapshot is rewritten to include the entry.
    pub fn set_json(&self, key: impl Into<String>, value: Value, ttl: Duration, persist_hint: bool) {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let durable = persist_hint && ttl > self.persist_threshold;
        let entry = if durable {
            CacheEntry::durable(value, expires_at)
        } else {
            CacheEntry::volatile(value, expires_at)
        };

        let mut hot = self.lock();
        let replaced = hot.insert(key.into(), entry);
        // A durable entry overwritten by a volatile one must leave the snapshot too.
        if durable || replaced.is_some_and(|old| old.persisted) {
            self.write_snapshot(&hot, now);
        }
    }

    /// Serializes `value` and stores it. A value that cannot be serialized is
    /// logged and not cached.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Duration,
        persist_hint: bool,
    ) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => self.set_json(key, value, ttl, persist_hint),
            Err(e) => warn!(key = %truncate(&key), error = %e, "Value not cacheable"),
        }
    }

    /// Removes `key`, returning whether it was present.
    ///
    /// Removing a persisted entry rewrites the snapshot.
    pub fn delete(&self, key: &str) -> bool {
        let mut hot = self.lock();
        match hot.remove(key) {
            Some(entry) => {
                if entry.persisted {
                    self.write_snapshot(&hot, Utc::now());
                }
                true
            }
            None => false,
        }
    }

    /// Removes every key starting with `prefix`, returning how many went.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut hot = self.lock();
        let before = hot.len();
        let mut touched_disk = false;
        hot.retain(|key, entry| {
            let keep = !key.starts_with(prefix);
            touched_disk |= !keep && entry.persisted;
            keep
        });
        if touched_disk {
            self.write_snapshot(&hot, Utc::now());
        }
        before - hot.len()
    }

    /// Empties the hot tier and deletes the snapshot file.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let mut hot = self.lock();
        hot.clear();
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.remove() {
                warn!(path = %snapshot.path().display(), error = %e, "Could not clear disk cache");
            }
        }
        debug!("Cleared all cache entries");
    }

    /// Returns the number of valid entries, purging expired ones.
    pub fn size(&self) -> usize {
        let now = Utc::now();
        let mut hot = self.lock();
        let before = hot.len();
        hot.retain(|_, entry| !entry.is_expired(now));
        let purged = before - hot.len();
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        hot.len()
    }

    /// Returns entry counts and the snapshot location.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let hot = self.lock();
        let expired_entries = hot.values().filter(|e| e.is_expired(now)).count();
        let persisted_entries = hot
            .values()
            .filter(|e| e.persisted && !e.is_expired(now))
            .count();
        CacheStats {
            total_entries: hot.len(),
            valid_entries: hot.len() - expired_entries,
            expired_entries,
            persisted_entries,
            location: self.snapshot.as_ref().map(|s| s.path().to_path_buf()),
            generated_at: now,
        }
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its
    /// `Ok` result.
    ///
    /// Errors are returned as-is and never cached. Concurrent callers that
    /// miss together will each run `compute`; the last write wins.
    pub async fn memoize<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        persist: bool,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !key.is_cacheable() {
            return compute().await;
        }
        let rendered = key.render();
        if let Some(hit) = self.get::<T>(&rendered) {
            debug!(key = %truncate(&rendered), "Cache HIT");
            return Ok(hit);
        }
        debug!(key = %truncate(&rendered), "Cache MISS");
        let value = compute().await?;
        self.set(rendered, &value, ttl, persist);
        Ok(value)
    }

    /// Blocking counterpart of [`memoize`](Self::memoize).
    pub fn memoize_blocking<T, E, F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        persist: bool,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        if !key.is_cacheable() {
            return compute();
        }
        let rendered = key.render();
        if let Some(hit) = self.get::<T>(&rendered) {
            debug!(key = %truncate(&rendered), "Cache HIT");
            return Ok(hit);
        }
        debug!(key = %truncate(&rendered), "Cache MISS");
        let value = compute()?;
        self.set(rendered, &value, ttl, persist);
        Ok(value)
    }

    fn write_snapshot(&self, hot: &HashMap<String, CacheEntry>, now: DateTime<Utc>) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        if let Err(e) = snapshot.write(hot, now) {
            warn!(
                path = %snapshot.path().display(),
                error = %e,
                "Could not save disk cache, continuing in memory"
            );
        }
    }
}

/// First 100 characters of a key, for log lines.
fn truncate(key: &str) -> &str {
    match key.char_indices().nth(100) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}
