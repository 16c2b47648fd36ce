//! Shims over injected third-party cache engines.
//!
//! Two engine shapes are supported:
//!
//! - [`FlatFileEngine`]: synchronous `get_key`/`set_key` stores with an explicit
//!   `save` (flat-file style). They have no notion of TTL, so entries are
//!   wrapped in an expiry envelope and expired lazily on read.
//! - [`AsyncMapEngine`]: async `get`/`set` stores that take a TTL themselves.

use super::backend::CacheBackend;
use super::clock::{default_clock, expiry_from, is_expired, Clock};
use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub trait FlatFileEngine: Send + Sync {
    fn get_key(&self, key: &str) -> Option<Value>;
    fn set_key(&self, key: &str, value: Value);
    fn remove_key(&self, key: &str);
    fn keys(&self) -> Vec<String>;
    /// Persist pending writes.
    fn save(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait AsyncMapEngine: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;
    async fn del(&self, key: &str) -> Result<bool>;
    async fn reset(&self) -> Result<()>;
    async fn size(&self) -> Result<usize>;
}

pub struct FlatFileAdapter<E> {
    engine: E,
    clock: Arc<dyn Clock>,
}

impl<E: FlatFileEngine> FlatFileAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            clock: default_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn unwrap_envelope(&self, raw: Value) -> Option<(Value, Option<u64>)> {
        let mut obj = match raw {
            Value::Object(obj) => obj,
            _ => return None,
        };
        let value = obj.remove("value")?;
        let expiry = obj.get("expiry").and_then(|e| e.as_u64());
        Some((value, expiry))
    }

    fn save(&self) -> Result<()> {
        self.engine.save().map_err(|e| {
            Error::cache_with_context(
                format!("engine save failed: {}", e),
                ErrorContext::new().with_source("flat_file_adapter"),
            )
        })
    }
}

#[async_trait]
impl<E: FlatFileEngine> CacheBackend for FlatFileAdapter<E> {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let Some(raw) = self.engine.get_key(&key.hash) else {
            return Ok(None);
        };
        match self.unwrap_envelope(raw) {
            Some((_, expiry)) if is_expired(self.clock.as_ref(), expiry) => {
                self.engine.remove_key(&key.hash);
                self.save()?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            // written by someone else without our envelope
            None => Ok(self.engine.get_key(&key.hash)),
        }
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expiry = expiry_from(self.clock.as_ref(), ttl);
        self.engine
            .set_key(&key.hash, json!({ "value": value, "expiry": expiry }));
        self.save()
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let existed = self.engine.get_key(&key.hash).is_some();
        if existed {
            self.engine.remove_key(&key.hash);
            self.save()?;
        }
        Ok(existed)
    }

    async fn clear(&self) -> Result<()> {
        for k in self.engine.keys() {
            self.engine.remove_key(&k);
        }
        self.save()
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.engine.keys().len())
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for k in self.engine.keys() {
            let expired = self
                .engine
                .get_key(&k)
                .and_then(|raw| self.unwrap_envelope(raw))
                .map(|(_, expiry)| is_expired(self.clock.as_ref(), expiry))
                .unwrap_or(false);
            if expired {
                self.engine.remove_key(&k);
                removed += 1;
            }
        }
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "flat-file-engine"
    }
}

pub struct AsyncMapAdapter<E> {
    engine: E,
}

impl<E: AsyncMapEngine> AsyncMapAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

#[async_trait]
impl<E: AsyncMapEngine> CacheBackend for AsyncMapAdapter<E> {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        self.engine.get(&key.hash).await
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.engine.set(&key.hash, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.engine.del(&key.hash).await
    }

    async fn clear(&self) -> Result<()> {
        self.engine.reset().await
    }

    async fn len(&self) -> Result<usize> {
        self.engine.size().await
    }

    fn name(&self) -> &'static str {
        "async-map-engine"
    }
}
