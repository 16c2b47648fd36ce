//! Benchmarks for cache key derivation and memory cache round-trips

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use llm_facade::cache::{CacheConfig, CacheKeyBuilder, CacheManager, MemoryCache};
use llm_facade::{InterfaceOptions, NormalizedRequest, RequestOptions};
use serde_json::json;

fn sample_request() -> NormalizedRequest {
    NormalizedRequest::new(
        "openai",
        "sk-benchmark",
        json!({"messages": [
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": "Summarize the plot of Hamlet in one sentence."}
        ]}),
    )
    .with_options(
        RequestOptions::new()
            .with_model("gpt-4o-mini")
            .with_max_tokens(128)
            .with_extra("temperature", 0.3)
            .with_extra("stop", json!(["\n\n"])),
    )
    .with_interface_options(InterfaceOptions::new().with_cache_timeout_seconds(3600))
}

fn bench_key_derivation(c: &mut Criterion) {
    let request = sample_request();
    c.bench_function("cache_key_for_request", |b| {
        b.iter(|| CacheKeyBuilder::for_request(black_box(&request)))
    });
}

fn bench_memory_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let manager = CacheManager::new(CacheConfig::default(), Box::new(MemoryCache::new(10_000)));
    let key = CacheKeyBuilder::for_request(&sample_request());
    let value = json!({"results": "Hamlet avenges his father and everyone dies.", "retries": 0});

    c.bench_function("memory_cache_set_get", |b| {
        b.to_async(&rt).iter(|| async {
            manager.set(&key, &value).await;
            black_box(manager.get::<serde_json::Value>(&key).await)
        })
    });
}

criterion_group!(benches, bench_key_derivation, bench_memory_round_trip);
criterion_main!(benches);
