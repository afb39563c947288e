//! Cache configuration and per-call-site TTLs.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default boundary between volatile and durable entries.
pub const DEFAULT_PERSIST_THRESHOLD: Duration = Duration::from_secs(300);

/// Default snapshot file name inside the cache directory.
pub const DEFAULT_SNAPSHOT_FILE: &str = "cache.json";

/// Settings for a [`TieredCache`](crate::TieredCache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding the disk snapshot.
    pub dir: PathBuf,
    /// Snapshot file name within `dir`.
    pub file_name: String,
    /// Entries set with a persist hint are only written to disk when their
    /// TTL is strictly greater than this.
    pub persist_threshold: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("folio_cache"),
            file_name: DEFAULT_SNAPSHOT_FILE.to_string(),
            persist_threshold: DEFAULT_PERSIST_THRESHOLD,
        }
    }
}

impl CacheConfig {
    /// Sets the snapshot directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the snapshot file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Sets the persistence threshold.
    #[must_use]
    pub const fn with_persist_threshold(mut self, threshold: Duration) -> Self {
        self.persist_threshold = threshold;
        self
    }

    /// Full path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// TTLs chosen per call site by how volatile the underlying data is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Live quote-like data.
    pub quotes: Duration,
    /// Portfolio summaries derived from quotes.
    pub portfolio_summary: Duration,
    /// Fundamentals, updated at most daily.
    pub fundamentals: Duration,
    /// Reads of the persisted series table.
    pub series: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            quotes: Duration::from_secs(5 * 60),
            portfolio_summary: Duration::from_secs(10 * 60),
            fundamentals: Duration::from_secs(24 * 60 * 60),
            series: Duration::from_secs(24 * 60 * 60),
        }
    }
}
