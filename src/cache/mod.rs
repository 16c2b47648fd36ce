//! 响应缓存模块：可插拔的缓存后端、稳定的缓存键与 TTL 语义。
//!
//! # Response Caching Module
//!
//! Pluggable response caching with TTL, so identical requests are answered
//! without another provider round-trip.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Store facade: TTL, statistics, errors degrade to misses |
//! | [`CacheBackend`] | Trait for implementing custom cache backends |
//! | [`MemoryCache`] | In-process map, oldest-inserted eviction at capacity |
//! | [`FileCache`] | One hashed JSON file per key under a directory |
//! | [`FlatFileAdapter`] / [`AsyncMapAdapter`] | Shims over injected third-party engines |
//! | [`NullCache`] | No-op cache for disabling caching |
//! | [`CacheKeyBuilder`] | Canonical, order-independent key derivation |
//!
//! ## Example
//!
//! ```rust
//! use llm_facade::cache::{CacheConfig, CacheKeyBuilder, CacheManager, MemoryCache};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let cache = CacheManager::new(CacheConfig::new(), Box::new(MemoryCache::new(1000)));
//! let key = CacheKeyBuilder::new().provider("openai").field("message", "hi").build();
//!
//! cache.set_with_ttl(&key, &"hello", Some(Duration::from_secs(60))).await;
//! let hit: Option<String> = cache.get(&key).await;
//! assert_eq!(hit.as_deref(), Some("hello"));
//! # });
//! ```
//!
//! ## Expiry
//!
//! Expiry is lazy: an expired entry is deleted when it is next read. A
//! periodic sweep can be started with [`CacheManager::spawn_sweeper`].

mod backend;
mod clock;
mod engine;
mod file;
mod key;
pub(crate) mod locks;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{AsyncMapAdapter, AsyncMapEngine, FlatFileAdapter, FlatFileEngine};
pub use file::FileCache;
pub use key::{build_key, CacheKey, CacheKeyBuilder};
pub use manager::{CacheConfig, CacheManager, CacheStats};
