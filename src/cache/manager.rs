//! Cache manager.
//!
//! Wraps a [`CacheBackend`] so that caching can never fail a request: every
//! backend error is logged, counted, and turned into a miss or a no-op.

use super::backend::CacheBackend;
use super::key::CacheKey;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL used by [`CacheManager::set`]. `None` caches indefinitely.
    pub default_ttl: Option<Duration>,
    pub enabled: bool,
    /// Serialized entries larger than this are not stored.
    pub max_entry_size: usize,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    stats: Arc<AtomicStats>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend: Arc::from(backend),
            stats: Arc::new(AtomicStats::default()),
        }
    }

    /// Look up and decode an entry. Backend and decode failures are misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let prefixed = self.prefix_key(key);
        match self.backend.get(&prefixed).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(val) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache_key = %key, backend = self.backend.name(), "cache hit");
                    Some(val)
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(cache_key = %key, error = %e, "cached entry has unexpected shape, ignoring");
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = %key, backend = self.backend.name(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Option<Duration>) {
        if !self.config.enabled {
            return;
        }
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = %key, error = %e, "value not cacheable");
                return;
            }
        };
        // size guard mirrors what a file backend would write
        let size = serde_json::to_vec(&value).map(|b| b.len()).unwrap_or(usize::MAX);
        if size > self.config.max_entry_size {
            debug!(cache_key = %key, size, "entry exceeds max size, skipping");
            return;
        }
        let prefixed = self.prefix_key(key);
        match self.backend.set(&prefixed, value, ttl).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = %key, backend = self.backend.name(), error = %e, "cache write failed");
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> bool {
        if !self.config.enabled {
            return false;
        }
        let prefixed = self.prefix_key(key);
        match self.backend.delete(&prefixed).await {
            Ok(deleted) => {
                if deleted {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                deleted
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = %key, error = %e, "cache delete failed");
                false
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.backend.clear().await {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            warn!(backend = self.backend.name(), error = %e, "cache clear failed");
        }
    }

    /// Number of live entries, or 0 when the backend cannot tell.
    pub async fn len(&self) -> usize {
        self.backend.len().await.unwrap_or(0)
    }

    /// Periodically drop expired entries. Abort the handle to stop.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match backend.sweep_expired().await {
                    Ok(0) => {}
                    Ok(n) => debug!(removed = n, backend = backend.name(), "swept expired cache entries"),
                    Err(e) => {
                        stats.errors.fetch_add(1, Ordering::Relaxed);
                        warn!(backend = backend.name(), error = %e, "cache sweep failed");
                    }
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn prefix_key(&self, key: &CacheKey) -> CacheKey {
        if let Some(ref p) = self.config.key_prefix {
            CacheKey::new(format!("{}:{}", p, key.hash))
        } else {
            key.clone()
        }
    }
}
