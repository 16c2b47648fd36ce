//! Cache keys, backends and the manager, exercised through the public API.

use async_trait::async_trait;
use llm_facade::cache::{
    CacheBackend, CacheConfig, CacheKey, CacheKeyBuilder, CacheManager, FileCache, ManualClock,
    MemoryCache,
};
use llm_facade::{
    EmbeddingRequest, Error, ErrorContext, InterfaceOptions, NormalizedRequest, RequestOptions,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn request(key: &str) -> NormalizedRequest {
    NormalizedRequest::new("openai", key, "What is a monad?")
        .with_options(
            RequestOptions::new()
                .with_model("gpt-4o-mini")
                .with_extra("temperature", 0.2)
                .with_extra("top_p", 0.9),
        )
        .with_interface_options(InterfaceOptions::new().with_cache_timeout_seconds(60))
}

#[test]
fn key_is_stable_and_hex() {
    let a = CacheKeyBuilder::for_request(&request("sk-1"));
    let b = CacheKeyBuilder::for_request(&request("sk-1"));
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 32);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn key_ignores_option_insertion_order() {
    let forward = request("sk-1");
    let mut reversed = request("sk-1");
    reversed.options.extra.clear();
    reversed.options = reversed
        .options
        .with_extra("top_p", 0.9)
        .with_extra("temperature", 0.2);

    assert_eq!(
        CacheKeyBuilder::for_request(&forward),
        CacheKeyBuilder::for_request(&reversed)
    );
}

#[test]
fn key_changes_with_credential_and_message() {
    let base = CacheKeyBuilder::for_request(&request("sk-1"));
    assert_ne!(base, CacheKeyBuilder::for_request(&request("sk-2")));

    let mut other_message = request("sk-1");
    other_message.message = "What is a functor?".into();
    assert_ne!(base, CacheKeyBuilder::for_request(&other_message));
}

#[test]
fn passthrough_options_cannot_shadow_the_credential() {
    let shadowing = |key: &str| {
        let mut r = request(key);
        r.options = r.options.with_extra("apiKey", "x");
        CacheKeyBuilder::for_request(&r)
    };
    assert_ne!(shadowing("tenant-A-key"), shadowing("tenant-B-key"));
}

#[test]
fn passthrough_options_cannot_shadow_the_message() {
    let asking = |question: &str| {
        let mut r = request("sk-1");
        r.message = question.into();
        r.options = r.options.with_extra("message", "fixed").with_extra("module", "other");
        CacheKeyBuilder::for_request(&r)
    };
    assert_ne!(asking("question one"), asking("question two"));
}

#[test]
fn embedding_options_cannot_shadow_the_text() {
    let embedding = |text: &str| {
        let r = EmbeddingRequest::new("openai", "sk-1", text)
            .with_options(RequestOptions::new().with_extra("embedding", "fixed"));
        CacheKeyBuilder::for_embedding(&r)
    };
    assert_ne!(embedding("first text"), embedding("second text"));
}

#[tokio::test]
async fn memory_cache_ttl_with_manual_clock() {
    let clock = ManualClock::new(1_000);
    let cache = MemoryCache::with_clock(16, Arc::new(clock.clone()));
    let key = CacheKey::new("k");

    cache
        .set(&key, json!({"results": "hi"}), Some(Duration::from_secs(60)))
        .await
        .unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), Some(json!({"results": "hi"})));

    clock.advance(Duration::from_secs(59));
    assert!(cache.get(&key).await.unwrap().is_some());

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn memory_cache_without_ttl_never_expires() {
    let clock = ManualClock::new(0);
    let cache = MemoryCache::with_clock(16, Arc::new(clock.clone()));
    let key = CacheKey::new("forever");

    cache.set(&key, json!(1), None).await.unwrap();
    clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert_eq!(cache.get(&key).await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn file_cache_round_trip_and_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(5_000);
    let cache = FileCache::open(dir.path())
        .await
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    let key = CacheKey::new("0123456789abcdef0123456789abcdef");

    cache
        .set(&key, json!({"results": [1, 2, 3]}), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(
        cache.get(&key).await.unwrap(),
        Some(json!({"results": [1, 2, 3]}))
    );

    // one envelope file named by a hex digest
    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_stem().unwrap().to_str().unwrap().to_string();
    assert_eq!(name.len(), 64);
    let envelope: Value = serde_json::from_slice(&std::fs::read(&files[0]).unwrap()).unwrap();
    assert_eq!(envelope["expiry"], json!(15_000));
    assert_eq!(envelope["isJson"], json!(true));

    clock.advance(Duration::from_secs(10));
    assert_eq!(cache.get(&key).await.unwrap(), None);
    // expired entries are removed on read
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn file_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = CacheKey::new("persisted");
    {
        let cache = FileCache::open(dir.path()).await.unwrap();
        cache.set(&key, json!("text payload"), None).await.unwrap();
    }
    let reopened = FileCache::open(dir.path()).await.unwrap();
    assert_eq!(reopened.get(&key).await.unwrap(), Some(json!("text payload")));
    assert!(reopened.delete(&key).await.unwrap());
    assert!(!reopened.delete(&key).await.unwrap());
}

#[tokio::test]
async fn file_cache_caps_entries() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::open(dir.path()).await.unwrap().with_max_entries(2);

    for i in 0..4 {
        cache
            .set(&CacheKey::new(format!("k{}", i)), json!(i), None)
            .await
            .unwrap();
    }
    assert_eq!(cache.len().await.unwrap(), 2);
    // the entry just written is never the one evicted
    assert_eq!(cache.get(&CacheKey::new("k3")).await.unwrap(), Some(json!(3)));
}

#[tokio::test]
async fn file_cache_sweep_removes_expired_and_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    let cache = FileCache::open(dir.path())
        .await
        .unwrap()
        .with_clock(Arc::new(clock.clone()));

    cache
        .set(&CacheKey::new("short"), json!(1), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    cache.set(&CacheKey::new("long"), json!(2), None).await.unwrap();
    std::fs::write(dir.path().join("garbage.json"), b"not json").unwrap();

    clock.advance(Duration::from_secs(2));
    assert_eq!(cache.sweep_expired().await.unwrap(), 2);
    assert_eq!(cache.len().await.unwrap(), 1);
}

/// Backend that fails every operation.
struct BrokenBackend;

fn broken() -> Error {
    Error::cache_with_context("disk on fire", ErrorContext::new().with_source("broken_backend"))
}

#[async_trait]
impl CacheBackend for BrokenBackend {
    async fn get(&self, _key: &CacheKey) -> llm_facade::Result<Option<Value>> {
        Err(broken())
    }
    async fn set(&self, _key: &CacheKey, _value: Value, _ttl: Option<Duration>) -> llm_facade::Result<()> {
        Err(broken())
    }
    async fn delete(&self, _key: &CacheKey) -> llm_facade::Result<bool> {
        Err(broken())
    }
    async fn clear(&self) -> llm_facade::Result<()> {
        Err(broken())
    }
    async fn len(&self) -> llm_facade::Result<usize> {
        Err(broken())
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn manager_turns_backend_errors_into_misses() {
    let manager = CacheManager::new(CacheConfig::default(), Box::new(BrokenBackend));
    let key = CacheKey::new("k");

    manager.set(&key, &json!("v")).await;
    assert_eq!(manager.get::<Value>(&key).await, None);
    assert!(!manager.delete(&key).await);
    manager.clear().await;
    assert_eq!(manager.len().await, 0);

    let stats = manager.stats();
    assert!(stats.errors >= 3);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn manager_tracks_hits_and_misses() {
    let manager = CacheManager::new(CacheConfig::default(), Box::new(MemoryCache::new(8)));
    let key = CacheKey::new("k");

    assert_eq!(manager.get::<Value>(&key).await, None);
    manager.set(&key, &json!({"results": "cached"})).await;
    assert_eq!(
        manager.get::<Value>(&key).await,
        Some(json!({"results": "cached"}))
    );

    let stats = manager.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.sets, 1);
    assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn disabled_manager_neither_reads_nor_writes() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileCache::open(dir.path()).await.unwrap();
    let manager = CacheManager::new(CacheConfig::new().with_enabled(false), Box::new(backend));
    let key = CacheKey::new("k");

    manager.set(&key, &json!("v")).await;
    assert_eq!(manager.get::<Value>(&key).await, None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(manager.stats().sets, 0);
}

#[tokio::test]
async fn key_prefixes_partition_a_shared_store() {
    let dir = tempfile::tempdir().unwrap();
    let manager_for = |prefix: &'static str| {
        let dir = dir.path().to_path_buf();
        async move {
            let backend = FileCache::open(dir).await.unwrap();
            CacheManager::new(CacheConfig::new().with_key_prefix(prefix), Box::new(backend))
        }
    };
    let staging = manager_for("staging").await;
    let prod = manager_for("prod").await;
    let prod_again = manager_for("prod").await;
    let key = CacheKey::new("shared");

    prod.set(&key, &json!("from prod")).await;
    assert_eq!(staging.get::<Value>(&key).await, None);
    assert_eq!(prod_again.get::<Value>(&key).await, Some(json!("from prod")));
}

#[tokio::test(start_paused = true)]
async fn sweeper_purges_expired_entries() {
    let clock = ManualClock::new(0);
    let backend = MemoryCache::with_clock(8, Arc::new(clock.clone()));
    let manager = CacheManager::new(CacheConfig::default(), Box::new(backend));
    manager
        .set_with_ttl(&CacheKey::new("k"), &json!(1), Some(Duration::from_secs(1)))
        .await;

    let sweeper = manager.spawn_sweeper(Duration::from_secs(30));
    clock.advance(Duration::from_secs(5));
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(manager.len().await, 0);
    sweeper.abort();
}
