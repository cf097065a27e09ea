//! Persistent summary cache.
//!
//! Maps `"<project id>:<fingerprint>"` to a generated summary with creation
//! and expiry timestamps. An entry is served only while it has not expired
//! and its fingerprint matches the record's current
//! [`fingerprint`](ProjectRecord::fingerprint); anything else is a miss and
//! goes to the [`Summarizer`].
//!
//! # Lifecycle
//!
//! ```text
//! open (read file) ──▶ get_or_create / invalidate / clear ──▶ flush (write file)
//!                               │                                  ▲
//!                               └──────── write-through ───────────┘
//! ```
//!
//! Every mutation is written through before returning. A flush serializes
//! the whole map, writes a sibling `.tmp` file, and renames it over the
//! cache file so readers never observe a partial write. One process owns the
//! file at a time.
//!
//! # File format
//!
//! ```json
//! {
//!   "p1:9f86d08...": {
//!     "summary": "AI Health Monitor tracks ...",
//!     "created_at": "2024-06-01T10:00:00Z",
//!     "expires_at": "2024-06-02T10:00:00Z"
//!   }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::AppError;
use crate::models::ProjectRecord;

/// Produces a summary for a record. Implemented by the model-backed
/// summarizer and by test doubles.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate a fresh summary. Failures map to
    /// [`AppError::SummarizerUnavailable`].
    async fn summarize(&self, record: &ProjectRecord) -> Result<String, AppError>;
}

/// One cached summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Composite key `"<id>:<fingerprint>"`.
pub fn cache_key(id: &str, fingerprint: &str) -> String {
    format!("{}:{}", id, fingerprint)
}

/// Split a composite key on its last `:`. Ids may themselves contain `:`.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.rsplit_once(':')
}

/// Summary cache with hit/miss accounting.
#[derive(Debug)]
pub struct SummaryCache {
    /// Backing file; `None` keeps the cache in memory only.
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
    hits: u64,
    misses: u64,
}

impl SummaryCache {
    /// Open the cache backed by `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is
    /// discarded with a warning and the cache starts empty; the next
    /// write-through replaces it.
    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => {
                if !entries.is_empty() {
                    info!(count = entries.len(), file = %path.display(), "loaded cached summaries");
                }
                entries
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable summary cache");
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path),
            entries,
            ttl,
            enabled: true,
            hits: 0,
            misses: 0,
        }
    }

    /// Build from configuration. When caching is disabled every lookup
    /// goes to the summarizer and nothing is persisted.
    pub fn from_config(config: &CacheConfig) -> Self {
        if config.enabled {
            Self::open(config.file_path(), config.expiry())
        } else {
            Self::disabled()
        }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
            ttl,
            enabled: true,
            hits: 0,
            misses: 0,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::in_memory(Duration::zero())
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached summary for `record` if present and live. Does not touch the
    /// hit/miss counters or call the summarizer.
    pub fn peek(&self, record: &ProjectRecord) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        let key = cache_key(&record.id, &record.fingerprint());
        self.entries
            .get(&key)
            .filter(|e| e.is_live(Utc::now()))
            .map(|e| e.summary.as_str())
    }

    /// Return the cached summary for `record`, generating and storing one
    /// on a miss.
    pub async fn get_or_create(
        &mut self,
        record: &ProjectRecord,
        summarizer: &dyn Summarizer,
    ) -> Result<String, AppError> {
        self.get_or_create_at(record, summarizer, Utc::now()).await
    }

    pub(crate) async fn get_or_create_at(
        &mut self,
        record: &ProjectRecord,
        summarizer: &dyn Summarizer,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let fingerprint = record.fingerprint();
        let key = cache_key(&record.id, &fingerprint);

        if self.enabled {
            if let Some(entry) = self.entries.get(&key).filter(|e| e.is_live(now)) {
                self.hits += 1;
                debug!(id = %record.id, "summary cache hit");
                return Ok(entry.summary.clone());
            }
        }

        self.misses += 1;
        debug!(id = %record.id, "summary cache miss");
        let summary = summarizer.summarize(record).await?;

        if self.enabled {
            self.entries
                .retain(|k, _| split_key(k).map_or(true, |(id, _)| id != record.id));
            self.entries.insert(
                key,
                CacheEntry {
                    summary: summary.clone(),
                    created_at: now,
                    expires_at: now
                        .checked_add_signed(self.ttl)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                },
            );
            if let Err(e) = self.flush() {
                warn!(error = %e, "failed to persist summary cache");
            }
        }

        Ok(summary)
    }

    /// Remove every entry for `id`, whatever its fingerprint.
    pub fn invalidate(&mut self, id: &str) -> Result<usize, AppError> {
        let before = self.entries.len();
        self.entries
            .retain(|k, _| split_key(k).map_or(true, |(entry_id, _)| entry_id != id));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Remove everything.
    pub fn clear(&mut self) -> Result<usize, AppError> {
        let removed = self.entries.len();
        self.entries.clear();
        self.flush()?;
        info!(removed, "summary cache cleared");
        Ok(removed)
    }

    /// Remove entries past their expiry.
    pub fn purge_expired(&mut self) -> Result<usize, AppError> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.flush()?;
        }
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let oldest = self.entries.values().map(|e| e.created_at).min();
        let newest = self.entries.values().map(|e| e.created_at).max();
        CacheStats {
            enabled: self.enabled,
            path: self.path.clone(),
            total_entries: self.entries.len(),
            expired_entries: self.entries.values().filter(|e| !e.is_live(now)).count(),
            hits: self.hits,
            misses: self.misses,
            oldest_age: oldest.map(|ts| now - ts),
            newest_age: newest.map(|ts| now - ts),
            file_size_bytes: self
                .path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map(|m| m.len())
                .unwrap_or(0),
        }
    }

    /// The full entry map, in the cache-file format.
    pub fn export_document(&self) -> &BTreeMap<String, CacheEntry> {
        &self.entries
    }

    /// Write [`export_document`](Self::export_document) to `path`.
    /// Returns the number of entries written.
    pub fn export_to(&self, path: &Path) -> Result<usize, AppError> {
        write_atomic(path, &self.entries)?;
        info!(count = self.entries.len(), file = %path.display(), "exported summaries");
        Ok(self.entries.len())
    }

    /// Persist the current entries. No-op for in-memory or disabled caches.
    pub fn flush(&self) -> Result<(), AppError> {
        match (&self.path, self.enabled) {
            (Some(path), true) => write_atomic(path, &self.entries),
            _ => Ok(()),
        }
    }
}

/// Process-lifetime counters and a snapshot of the stored entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub total_entries: usize,
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub oldest_age: Option<Duration>,
    pub newest_age: Option<Duration>,
    pub file_size_bytes: u64,
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, CacheEntry>, AppError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(AppError::CacheCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&content).map_err(|e| AppError::CacheCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_atomic(path: &Path, entries: &BTreeMap<String, CacheEntry>) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
