//! Disk tier: a JSON snapshot of the durable hot-tier entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::tiered::CacheEntry;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct SnapshotDoc {
    version: u32,
    entries: BTreeMap<String, StoredEntry>,
}

#[derive(Debug, Deserialize)]
struct StoredEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct SnapshotDocRef<'a> {
    version: u32,
    entries: BTreeMap<&'a str, StoredEntryRef<'a>>,
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    value: &'a Value,
    expires_at: DateTime<Utc>,
}

/// Location of the snapshot file.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every entry still valid at `now`. A missing file is an empty
    /// cache; an unreadable or corrupt one is logged and treated the same.
    pub(crate) fn load(&self, now: DateTime<Utc>) -> HashMap<String, CacheEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache snapshot, starting empty");
                return HashMap::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read cache snapshot");
                return HashMap::new();
            }
        };

        let doc = match serde_json::from_str::<SnapshotDoc>(&content) {
            Ok(doc) if doc.version == SNAPSHOT_VERSION => doc,
            Ok(doc) => {
                warn!(
                    path = %self.path.display(),
                    version = doc.version,
                    "Unsupported cache snapshot version, ignoring"
                );
                return HashMap::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt cache snapshot, ignoring");
                return HashMap::new();
            }
        };

        let stored = doc.entries.len();
        let entries: HashMap<String, CacheEntry> = doc
            .entries
            .into_iter()
            .filter(|(_, entry)| now < entry.expires_at)
            .map(|(key, entry)| (key, CacheEntry::durable(entry.value, entry.expires_at)))
            .collect();

        info!(
            path = %self.path.display(),
            loaded = entries.len(),
            dropped = stored - entries.len(),
            "Loaded cached entries from disk"
        );
        entries
    }

    /// Replaces the snapshot with the persisted entries still valid at `now`.
    ///
    /// Writes a sibling temp file first and renames it over the snapshot.
    pub(crate) fn write<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a String, &'a CacheEntry)>,
        now: DateTime<Utc>,
    ) -> io::Result<usize> {
        let doc = SnapshotDocRef {
            version: SNAPSHOT_VERSION,
            entries: entries
                .into_iter()
                .filter(|(_, entry)| entry.persisted && !entry.is_expired(now))
                .map(|(key, entry)| {
                    (
                        key.as_str(),
                        StoredEntryRef {
                            value: &entry.value,
                            expires_at: entry.expires_at,
                        },
                    )
                })
                .collect(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_vec(&doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), entries = doc.entries.len(), "Wrote cache snapshot");
        Ok(doc.entries.len())
    }

    /// Deletes the snapshot file; a missing file is not an error.
    pub(crate) fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
