//! The verdict cache: ContentKey → CacheEntry with a TTL.
//!
//! The whole map is serialized as one JSON value under [`CACHE_STORAGE_KEY`]
//! and rewritten after every mutation. Durability is best-effort: backend
//! failures are logged and never reach the caller, and a corrupt persisted
//! value loads as an empty cache.

pub mod backend;
pub mod pg;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};
pub use pg::PgBackend;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::model::{CacheEntry, CacheStats, ContentKey};

/// Backend key holding the serialized cache.
pub const CACHE_STORAGE_KEY: &str = "post_analysis_cache";

pub struct CacheStore {
    backend: Box<dyn CacheBackend>,
    entries: HashMap<ContentKey, CacheEntry>,
    ttl: Duration,
    last_update: Option<DateTime<Utc>>,
    /// Expired entries skipped at load that are still in the backend.
    stale_on_load: usize,
    /// Memory differs from what the backend last accepted.
    dirty: bool,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl CacheStore {
    /// Load the persisted cache, dropping entries that have already expired.
    ///
    /// Expired entries are only dropped in memory here; the next
    /// [`CacheStore::evict_expired`] removes them from the backend.
    pub async fn load(backend: Box<dyn CacheBackend>, ttl: Duration) -> Self {
        Self::load_at(backend, ttl, now_ms()).await
    }

    /// [`CacheStore::load`] with an explicit clock.
    pub async fn load_at(backend: Box<dyn CacheBackend>, ttl: Duration, now_ms: i64) -> Self {
        let raw = match backend.get(CACHE_STORAGE_KEY).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "cache load failed, starting empty");
                None
            }
        };

        let mut entries = HashMap::new();
        let mut stale_on_load = 0;
        if let Some(raw) = raw {
            match serde_json::from_str::<HashMap<ContentKey, CacheEntry>>(&raw) {
                Ok(persisted) => {
                    let total = persisted.len();
                    entries.extend(
                        persisted
                            .into_iter()
                            .filter(|(_, entry)| entry.is_fresh_at(now_ms, ttl)),
                    );
                    stale_on_load = total - entries.len();
                    info!(loaded = entries.len(), expired = stale_on_load, "cache loaded");
                }
                Err(e) => warn!(error = %e, "persisted cache is corrupt, starting empty"),
            }
        }

        Self {
            backend,
            entries,
            ttl,
            last_update: None,
            stale_on_load,
            dirty: false,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &ContentKey) -> Option<&CacheEntry> {
        self.get_at(key, now_ms())
    }

    pub fn get_at(&self, key: &ContentKey, now_ms: i64) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now_ms, self.ttl))
    }

    /// Upsert an entry and persist.
    pub async fn put(&mut self, key: ContentKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
        self.touch();
        self.write_back().await;
    }

    /// Whether memory holds changes the backend has not accepted yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the map back if it has unsaved changes. A store that was never
    /// mutated writes nothing, so a failed or partial load cannot overwrite
    /// the durable copy.
    pub async fn flush(&mut self) {
        if self.dirty {
            self.write_back().await;
        }
    }

    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
        self.dirty = true;
    }

    /// Write the full map to the backend. Failures are logged and leave the
    /// store dirty.
    async fn write_back(&mut self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "cache serialization failed");
                return;
            }
        };
        match self.backend.put(CACHE_STORAGE_KEY, &json).await {
            Ok(()) => {
                self.dirty = false;
                self.stale_on_load = 0;
                debug!(entries = self.entries.len(), "cache persisted");
            }
            Err(e) => warn!(error = %e, "cache persist failed"),
        }
    }

    /// Remove every expired entry, in memory and in the backend. Returns how
    /// many were removed, counting those already skipped at load.
    pub async fn evict_expired(&mut self) -> usize {
        self.evict_expired_at(now_ms()).await
    }

    pub async fn evict_expired_at(&mut self, now_ms: i64) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh_at(now_ms, ttl));
        let removed = before - self.entries.len() + self.stale_on_load;

        if removed > 0 {
            self.touch();
            self.write_back().await;
            info!(removed, remaining = self.entries.len(), "expired cache entries evicted");
        }
        removed
    }

    /// Drop every entry, in memory and in the backend.
    pub async fn clear(&mut self) {
        self.entries.clear();
        self.touch();
        match self.backend.remove(CACHE_STORAGE_KEY).await {
            Ok(()) => {
                self.dirty = false;
                self.stale_on_load = 0;
            }
            Err(e) => warn!(error = %e, "removing persisted cache failed"),
        }
        info!("cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            count: self.entries.len(),
            last_update: self.last_update,
        }
    }

    /// Entries held in memory, including any that expired since the last sweep.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
