//! Cache backend implementations.

use super::clock::{default_clock, expiry_from, is_expired, Clock};
use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    expiry: Option<u64>,
}

/// Storage capability every cache variant provides.
///
/// `ttl: None` means "keep indefinitely" (or the engine's own default for
/// engines that cannot express that). Implementations expire lazily: an
/// expired entry found by `get` is removed and reported as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>>;
    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    /// Drop every expired entry, returning how many were removed.
    async fn sweep_expired(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str;
}

/// In-process map. Capacity-bounded instances evict the oldest inserted key.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// `max_entries == 0` means unbounded.
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, default_clock())
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        let entries = match NonZeroUsize::new(max_entries) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        self.entries.lock().map_err(|_| {
            Error::cache_with_context(
                "memory cache lock poisoned",
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let mut entries = self.lock()?;
        // peek, not get: recency must not reorder eviction
        let expired = match entries.peek(&key.hash) {
            Some(entry) => is_expired(self.clock.as_ref(), entry.expiry),
            None => return Ok(None),
        };
        if expired {
            entries.pop(&key.hash);
            return Ok(None);
        }
        Ok(entries.peek(&key.hash).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expiry = expiry_from(self.clock.as_ref(), ttl);
        let mut entries = self.lock()?;
        // re-inserting a key counts as a fresh insertion
        entries.pop(&key.hash);
        if let Some((evicted, _)) = entries.push(key.hash.clone(), CacheEntry { value, expiry }) {
            debug!(evicted_key = evicted.as_str(), "memory cache evicted oldest entry");
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.pop(&key.hash).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .filter(|(_, e)| !is_expired(self.clock.as_ref(), e.expiry))
            .count())
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| is_expired(self.clock.as_ref(), e.expiry))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            entries.pop(k);
        }
        Ok(expired.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Value>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: Value, _: Option<Duration>) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use serde_json::json;

    #[tokio::test]
    async fn evicts_oldest_inserted_even_after_reads() {
        let cache = MemoryCache::new(2);
        cache.set(&"a".into(), json!(1), None).await.unwrap();
        cache.set(&"b".into(), json!(2), None).await.unwrap();
        // reading "a" must not protect it
        assert_eq!(cache.get(&"a".into()).await.unwrap(), Some(json!(1)));
        cache.set(&"c".into(), json!(3), None).await.unwrap();
        assert_eq!(cache.get(&"a".into()).await.unwrap(), None);
        assert_eq!(cache.get(&"b".into()).await.unwrap(), Some(json!(2)));
        assert_eq!(cache.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_removed_on_read() {
        let clock = ManualClock::new(1_000);
        let cache = MemoryCache::with_clock(0, Arc::new(clock.clone()));
        cache
            .set(&"k".into(), json!("v"), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get(&"k".into()).await.unwrap(), None);
        assert!(!cache.delete(&"k".into()).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let clock = ManualClock::new(0);
        let cache = MemoryCache::with_clock(0, Arc::new(clock.clone()));
        cache.set(&"short".into(), json!(1), Some(Duration::from_secs(1))).await.unwrap();
        cache.set(&"forever".into(), json!(2), None).await.unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.sweep_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
