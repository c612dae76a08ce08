//! Disk cache with TTL expiry and size-bounded LRU eviction
//!
//! Each entry is one JSON file named by the blake3 digest of its key. Writes
//! go through a temp file in the cache directory and are renamed into place,
//! so readers never see a partial entry. A file's modification time records
//! its last access and drives eviction.

use std::fs::{self, File};
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, warn};

use pyconflict_core::utils::cache_key;
use pyconflict_core::{PycError, PycResult};

/// Default upper bound on the cache directory size
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// Eviction stops once usage is at or below this share of the maximum
const EVICTION_TARGET: f64 = 0.8;

/// Serialized cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Logical key, checked on read to rule out digest collisions
    pub key: String,
    pub value: serde_json::Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub stored_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry expiring `ttl` from now
    pub fn new(key: impl Into<String>, value: serde_json::Value, ttl: Duration) -> PycResult<Self> {
        let stored_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored_at.checked_add_signed(ttl))
            .ok_or_else(|| PycError::Cache {
                message: format!("TTL of {}s is out of range", ttl.as_secs()),
            })?;
        Ok(Self {
            key: key.into(),
            value,
            stored_at,
            expires_at,
        })
    }

    /// Check if cache entry is still fresh
    pub fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }

    /// Get age of cache entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at).to_std().unwrap_or_default()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Bytes used by all entries
    pub total_bytes: u64,
    /// Entries past their TTL that have not been removed yet
    pub expired_entries: usize,
}

/// JSON-file cache rooted at one directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: Utf8PathBuf,
    max_size_bytes: u64,
}

impl DiskCache {
    /// Open (creating if needed) a cache directory
    pub fn new(root: impl Into<Utf8PathBuf>, max_size_mb: u64) -> PycResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            PycError::io(format!("Failed to create cache directory: {}", root), e)
        })?;
        Ok(Self {
            root,
            max_size_bytes: max_size_mb.saturating_mul(1024 * 1024),
        })
    }

    /// Override the size limit in bytes
    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Look up a fresh value. Missing, expired, corrupt and colliding
    /// entries are all misses.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %path, error = %err, "removing corrupt cache entry");
                remove_quietly(&path);
                return None;
            },
        };

        if entry.key != key {
            debug!(key, stored = %entry.key, "cache digest collision");
            return None;
        }

        if !entry.is_fresh() {
            debug!(key, "cache entry expired");
            remove_quietly(&path);
            return None;
        }

        touch(&path);
        debug!(key, "cache hit");
        Some(entry.value)
    }

    /// Store a value, then evict old entries if the cache is over its limit
    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> PycResult<()> {
        let entry = CacheEntry::new(key, value, ttl)?;
        let bytes = serde_json::to_vec(&entry).map_err(|e| PycError::Cache {
            message: format!("Failed to serialize cache entry: {}", e),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| PycError::io("Failed to create temporary cache file".to_string(), e))?;
        temp.write_all(&bytes)
            .map_err(|e| PycError::io("Failed to write cache entry".to_string(), e))?;
        temp.persist(self.entry_path(key))
            .map_err(|e| PycError::io("Failed to move cache entry into place".to_string(), e.error))?;

        self.evict_if_needed()
    }

    /// Remove every entry, returning how many were removed
    pub fn clear(&self) -> PycResult<usize> {
        let mut removed = 0;
        for (path, _) in self.entries()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => {
                    return Err(PycError::io(format!("Failed to remove {}", path), e));
                },
            }
        }
        Ok(removed)
    }

    /// Count entries and bytes
    pub fn stats(&self) -> PycResult<CacheStats> {
        let mut stats = CacheStats::default();
        for (path, metadata) in self.entries()? {
            stats.total_entries += 1;
            stats.total_bytes += metadata.len();
            if !read_entry(&path).map_or(false, |entry| entry.is_fresh()) {
                stats.expired_entries += 1;
            }
        }
        Ok(stats)
    }

    /// Remove expired and unreadable entries, returning how many were removed
    pub fn prune(&self) -> PycResult<usize> {
        let mut removed = 0;
        for (path, _) in self.entries()? {
            if !read_entry(&path).map_or(false, |entry| entry.is_fresh()) {
                remove_quietly(&path);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entry_path(&self, key: &str) -> Utf8PathBuf {
        self.root.join(format!("{}.json", cache_key(key)))
    }

    /// Entry files with their metadata. Files that vanish while listing are
    /// skipped.
    fn entries(&self) -> PycResult<Vec<(Utf8PathBuf, fs::Metadata)>> {
        let dir = match self.root.read_dir_utf8() {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PycError::io(
                    format!("Failed to read cache directory: {}", self.root),
                    e,
                ))
            },
        };

        let mut entries = Vec::new();
        for dir_entry in dir.flatten() {
            let path = dir_entry.path();
            if path.extension() != Some("json") {
                continue;
            }
            if let Ok(metadata) = dir_entry.metadata() {
                if metadata.is_file() {
                    entries.push((path.to_path_buf(), metadata));
                }
            }
        }
        Ok(entries)
    }

    /// Drop least recently used entries until usage is at most 80% of the
    /// limit. Only runs once the limit is exceeded.
    fn evict_if_needed(&self) -> PycResult<()> {
        let mut entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|(_, metadata)| metadata.len()).sum();
        if total <= self.max_size_bytes {
            return Ok(());
        }

        let target = (self.max_size_bytes as f64 * EVICTION_TARGET) as u64;
        entries.sort_by_key(|(_, metadata)| metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH));

        let mut evicted = 0;
        for (path, metadata) in entries {
            if total <= target {
                break;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    total = total.saturating_sub(metadata.len());
                    evicted += 1;
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    total = total.saturating_sub(metadata.len());
                },
                Err(e) => warn!(path = %path, error = %e, "failed to evict cache entry"),
            }
        }
        debug!(evicted, remaining_bytes = total, "cache eviction finished");
        Ok(())
    }
}

fn read_entry(path: &Utf8Path) -> Option<CacheEntry> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn remove_quietly(path: &Utf8Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path, error = %e, "failed to remove cache entry");
        }
    }
}

/// Mark an entry as recently used
fn touch(path: &Utf8Path) {
    let result = File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        debug!(path = %path, error = %e, "could not refresh cache entry access time");
    }
}

#[cfg(test)]
mod tests;
