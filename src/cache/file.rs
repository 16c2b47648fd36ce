//! On-disk cache: one JSON file per key.
//!
//! File names are the SHA-256 hex of the cache key, so arbitrary keys map to
//! safe paths. Each file holds an envelope:
//!
//! ```json
//! { "value": ..., "expiry": 1700000000000, "isJson": true }
//! ```
//!
//! `expiry` is unix milliseconds or `null` for entries that never expire.

use super::backend::CacheBackend;
use super::clock::{default_clock, expiry_from, is_expired, Clock};
use super::key::CacheKey;
use super::locks::KeyedLocks;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const FILE_EXT: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: Value,
    expiry: Option<u64>,
    /// False when `value` is a bare string. Readers in other runtimes use it
    /// to decide whether to decode the payload.
    #[serde(rename = "isJson", default)]
    is_json: bool,
}

pub struct FileCache {
    dir: PathBuf,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
    /// Per-path write locks; two writers to one file never interleave.
    write_locks: KeyedLocks,
}

impl FileCache {
    /// Open (and create if needed) a cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            max_entries: None,
            clock: default_clock(),
            write_locks: KeyedLocks::new(),
        })
    }

    /// Cap the number of files; the oldest written file goes first.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = if max == 0 { None } else { Some(max) };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.hash.as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}.{}", name, FILE_EXT))
    }

    async fn lock_path(&self, path: &Path) -> tokio::sync::OwnedMutexGuard<()> {
        self.write_locks.acquire(&path.to_string_lossy()).await
    }

    async fn read_envelope(path: &Path) -> Result<Option<Envelope>> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn remove_file(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Cache files with their modification time, oldest first.
    async fn entries_by_age(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut out = Vec::new();
        let mut rd = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((path, modified));
        }
        out.sort_by_key(|(_, t)| *t);
        Ok(out)
    }

    async fn enforce_capacity(&self, keep: &Path) -> Result<()> {
        let Some(max) = self.max_entries else {
            return Ok(());
        };
        let entries = self.entries_by_age().await?;
        if entries.len() <= max {
            return Ok(());
        }
        let excess = entries.len() - max;
        for (path, _) in entries.into_iter().filter(|(p, _)| p != keep).take(excess) {
            debug!(path = %path.display(), "file cache evicted oldest entry");
            Self::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let Some(envelope) = Self::read_envelope(&path).await? else {
            return Ok(None);
        };
        if !is_expired(self.clock.as_ref(), envelope.expiry) {
            return Ok(Some(envelope.value));
        }

        // a writer may have replaced the file since it was read
        let _guard = self.lock_path(&path).await;
        match Self::read_envelope(&path).await? {
            Some(current) if !is_expired(self.clock.as_ref(), current.expiry) => {
                Ok(Some(current.value))
            }
            Some(_) => {
                Self::remove_file(&path).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> Result<()> {
        let path = self.path_for(key);
        let envelope = Envelope {
            is_json: !value.is_string(),
            value,
            expiry: expiry_from(self.clock.as_ref(), ttl),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        {
            let _guard = self.lock_path(&path).await;
            let tmp = path.with_extension(format!("{}.tmp-{}", FILE_EXT, uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, &bytes).await?;
            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
        }
        self.enforce_capacity(&path).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let path = self.path_for(key);
        let _guard = self.lock_path(&path).await;
        Self::remove_file(&path).await
    }

    async fn clear(&self) -> Result<()> {
        for (path, _) in self.entries_by_age().await? {
            Self::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let mut live = 0;
        for (path, _) in self.entries_by_age().await? {
            match Self::read_envelope(&path).await {
                Ok(Some(env)) if !is_expired(self.clock.as_ref(), env.expiry) => live += 1,
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable cache file"),
            }
        }
        Ok(live)
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for (path, _) in self.entries_by_age().await? {
            let expired = match Self::read_envelope(&path).await {
                Ok(Some(env)) => is_expired(self.clock.as_ref(), env.expiry),
                Ok(None) => false,
                // corrupt files are dropped too
                Err(_) => true,
            };
            if expired && Self::remove_file(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use serde_json::json;

    #[tokio::test]
    async fn write_locks_do_not_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).await.unwrap();
        for i in 0..50 {
            let key = CacheKey::new(format!("k{}", i));
            cache.set(&key, json!(i), None).await.unwrap();
            cache.delete(&key).await.unwrap();
        }
        assert!(cache.write_locks.tracked() <= 1);
    }

    #[tokio::test]
    async fn expired_read_keeps_a_concurrent_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let cache = Arc::new(
            FileCache::open(dir.path())
                .await
                .unwrap()
                .with_clock(Arc::new(clock.clone())),
        );
        let key = CacheKey::new("k");
        cache.set(&key, json!("stale"), Some(Duration::from_secs(1))).await.unwrap();
        clock.advance(Duration::from_secs(2));

        let path = cache.path_for(&key);
        let guard = cache.lock_path(&path).await;
        let reader = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.get(&key).await })
        };
        // the reader has seen the stale file and now waits for the lock
        tokio::time::sleep(Duration::from_millis(100)).await;
        let fresh = Envelope {
            value: json!("fresh"),
            expiry: None,
            is_json: false,
        };
        tokio::fs::write(&path, serde_json::to_vec(&fresh).unwrap()).await.unwrap();
        drop(guard);

        assert_eq!(reader.await.unwrap().unwrap(), Some(json!("fresh")));
        assert!(path.exists());
    }
}
