//! End-to-end behavior of `LlmClient` over scripted provider adapters.

mod common;

use common::{counting_registry, init_tracing, ok, registry_with, status, ScriptedAdapter};
use llm_facade::cache::MemoryCache;
use llm_facade::client::{AdapterResponse, ProviderAdapter, ProviderRegistry};
use llm_facade::config::{CacheKind, ClientConfig};
use llm_facade::{
    Credential, EmbeddingRequest, Error, InterfaceOptions, LlmClient, Message, NormalizedRequest,
    RequestOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn ask(key: &str) -> NormalizedRequest {
    NormalizedRequest::new("mock", key, "Say hello")
}

async fn memory_client(adapter: Arc<ScriptedAdapter>) -> LlmClient {
    init_tracing();
    LlmClient::builder()
        .with_registry(registry_with("mock", adapter))
        .with_memory_cache()
        .build()
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn retries_then_serves_second_call_from_cache() {
    let adapter = Arc::new(ScriptedAdapter::new(vec![status(502), status(502), ok("hello")]));
    let client = memory_client(adapter.clone()).await;

    let first = client.send(&ask("sk-1")).await.unwrap();
    assert_eq!(first.results, "hello");
    assert_eq!(first.retries, 2);
    assert_eq!(adapter.calls(), 3);

    let second = client.send(&ask("sk-1")).await.unwrap();
    assert_eq!(second.results, "hello");
    assert_eq!(adapter.calls(), 3);
    assert_eq!(client.cache_stats().unwrap().hits, 1);
}

#[tokio::test]
async fn credentials_never_share_cache_entries() {
    let adapter = Arc::new(ScriptedAdapter::answering("hi"));
    let client = memory_client(adapter.clone()).await;

    client.send(&ask("sk-1")).await.unwrap();
    client.send(&ask("sk-2")).await.unwrap();
    client.send(&ask("sk-1")).await.unwrap();

    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn adapters_are_pooled_per_credential() {
    let built = Arc::new(AtomicUsize::new(0));
    let client = LlmClient::builder()
        .with_registry(counting_registry("mock", built.clone()))
        .build()
        .await
        .unwrap();

    client.send(&ask("sk-1")).await.unwrap();
    client.send(&ask("sk-1")).await.unwrap();
    client.send(&ask("sk-2")).await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert_eq!(client.adapter_count(), 2);
}

#[tokio::test]
async fn ttl_store_only_caches_calls_with_a_timeout() {
    let adapter = Arc::new(ScriptedAdapter::answering("hi"));
    let client = LlmClient::builder()
        .with_registry(registry_with("mock", adapter.clone()))
        .with_cache_backend(Box::new(MemoryCache::new(64)))
        .build()
        .await
        .unwrap();

    client.send(&ask("sk-1")).await.unwrap();
    client.send(&ask("sk-1")).await.unwrap();
    assert_eq!(adapter.calls(), 2);

    let timed = ask("sk-1")
        .with_interface_options(InterfaceOptions::new().with_cache_timeout_seconds(300));
    client.send(&timed).await.unwrap();
    client.send(&timed).await.unwrap();
    assert_eq!(adapter.calls(), 3);
}

#[tokio::test]
async fn configuration_errors_fail_before_any_attempt() {
    let adapter = Arc::new(ScriptedAdapter::answering("hi"));
    let client = memory_client(adapter.clone()).await;

    let blank = client.send(&ask("  ")).await.unwrap_err();
    assert!(blank.is_configuration());

    let unknown = NormalizedRequest::new("nobody", "sk-1", "hi");
    let err = client.send(&unknown).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("nobody"));

    let err = client
        .send_message("mock", "hi", RequestOptions::new(), InterfaceOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let err = client
        .send(&NormalizedRequest::new("mock", "sk-1", json!({"messages": []})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn send_message_uses_stored_key_and_normalizes_text() {
    let adapter = Arc::new(ScriptedAdapter::answering("hi there"));
    let client = memory_client(adapter.clone()).await;
    client.set_api_key("mock", "sk-stored");

    let result = client
        .send_message("mock", "hello?", RequestOptions::new(), InterfaceOptions::new())
        .await
        .unwrap();

    assert_eq!(result.text(), Some("hi there"));
    assert_eq!(
        adapter.last_message.lock().unwrap().clone(),
        Some(json!({"messages": [{"role": "user", "content": "hello?"}]}))
    );
}

#[tokio::test]
async fn conversations_pass_through_and_key_on_every_turn() {
    let adapter = Arc::new(ScriptedAdapter::answering("Paris."));
    let client = memory_client(adapter.clone()).await;
    let conversation = |last: &str| {
        NormalizedRequest::new(
            "mock",
            "sk-1",
            vec![
                Message::system("Answer in one word."),
                Message::user("Capital of France?"),
                Message::assistant("Paris."),
                Message::user(last),
            ],
        )
    };

    client.send(&conversation("And of Italy?")).await.unwrap();
    assert_eq!(
        adapter.last_message.lock().unwrap().clone().unwrap()["messages"][0],
        json!({"role": "system", "content": "Answer in one word."})
    );
    client.send(&conversation("And of Italy?")).await.unwrap();
    assert_eq!(adapter.calls(), 1);

    client.send(&conversation("And of Spain?")).await.unwrap();
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn fatal_errors_propagate_and_are_not_cached() {
    let adapter = Arc::new(ScriptedAdapter::new(vec![status(401)]));
    let client = memory_client(adapter.clone()).await;

    let err = client.send(&ask("sk-1")).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.attempt(), Some(1));

    let ok = client.send(&ask("sk-1")).await.unwrap();
    assert_eq!(ok.results, "default reply");
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn soft_failures_are_returned_and_not_cached() {
    let adapter = Arc::new(ScriptedAdapter::new(vec![status(503)]));
    let client = memory_client(adapter.clone()).await;
    let once = ask("sk-1").with_interface_options(InterfaceOptions::new().with_retry_attempts(1));

    let failed = client.send(&once).await.unwrap();
    assert_eq!(failed.success, Some(false));
    assert!(failed.error.is_some());

    let recovered = client.send(&once).await.unwrap();
    assert!(recovered.is_success());
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn json_mode_parses_and_strips_original_response() {
    let reply = AdapterResponse::new("```json\n{\"mood\": \"sunny\"}\n```")
        .with_original(json!({"id": "resp-1"}));
    let adapter = Arc::new(ScriptedAdapter::new(vec![Ok(reply.clone()), Ok(reply)]));
    let client = LlmClient::builder()
        .with_registry(registry_with("mock", adapter))
        .build()
        .await
        .unwrap();
    let json_mode = RequestOptions::new().with_response_format("json_object");

    let stripped = client
        .send(&ask("sk-1").with_options(json_mode.clone()))
        .await
        .unwrap();
    assert_eq!(stripped.results, json!({"mood": "sunny"}));
    assert!(stripped.original_response.is_none());

    let kept = client
        .send(
            &ask("sk-1")
                .with_options(json_mode)
                .with_interface_options(InterfaceOptions::new().with_original_response(true)),
        )
        .await
        .unwrap();
    assert_eq!(kept.original_response, Some(json!({"id": "resp-1"})));
}

#[tokio::test]
async fn json_repair_applies_to_text_replies() {
    let adapter = Arc::new(ScriptedAdapter::answering("{answer: 'yes', score: 3,}"));
    let client = LlmClient::builder()
        .with_registry(registry_with("mock", adapter))
        .build()
        .await
        .unwrap();

    let result = client
        .send(&ask("sk-1").with_interface_options(InterfaceOptions::new().with_json_repair(true)))
        .await
        .unwrap();
    assert_eq!(result.results, json!({"answer": "yes", "score": 3}));
}

#[tokio::test]
async fn embeddings_fall_back_to_default_provider() {
    let primary = Arc::new(ScriptedAdapter::answering("no vectors here"));
    let backup = Arc::new(ScriptedAdapter::answering(json!([0.1, 0.2, 0.3])).with_embeddings());
    let backup_for_factory = backup.clone();
    let registry = registry_with("mock", primary.clone()).with_provider(
        "backup",
        move |_: &Credential| Ok(backup_for_factory.clone() as Arc<dyn ProviderAdapter>),
    );
    let client = LlmClient::builder()
        .with_registry(registry)
        .with_api_key("backup", "sk-backup")
        .build()
        .await
        .unwrap();

    let request = EmbeddingRequest::new("mock", "sk-1", "embed me")
        .with_options(RequestOptions::new().with_model("mock-embed"))
        .with_interface_options(InterfaceOptions::new().with_embeddings_default_provider("backup"));
    let result = client.embeddings(&request).await.unwrap();

    assert_eq!(result.results, json!([0.1, 0.2, 0.3]));
    assert_eq!(primary.calls(), 0);
    assert_eq!(backup.calls(), 1);
}

#[tokio::test]
async fn embeddings_without_fallback_report_the_original_error() {
    let adapter = Arc::new(ScriptedAdapter::answering("text"));
    let client = memory_client(adapter).await;

    let err = client
        .embeddings(&EmbeddingRequest::new("mock", "sk-1", "embed me"))
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("does not support embeddings"));
}

#[tokio::test]
async fn embeddings_are_cached_separately_from_chat() {
    let adapter = Arc::new(ScriptedAdapter::answering(json!([1.0])).with_embeddings());
    let client = memory_client(adapter.clone()).await;

    client
        .embeddings(&EmbeddingRequest::new("mock", "sk-1", "Say hello"))
        .await
        .unwrap();
    client.send(&ask("sk-1")).await.unwrap();
    client
        .embeddings(&EmbeddingRequest::new("mock", "sk-1", "Say hello"))
        .await
        .unwrap();

    assert_eq!(adapter.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn single_flight_coalesces_concurrent_misses() {
    let adapter = Arc::new(ScriptedAdapter::answering("once").with_delay(Duration::from_millis(100)));
    let client = LlmClient::builder()
        .with_registry(registry_with("mock", adapter.clone()))
        .with_memory_cache()
        .with_single_flight(true)
        .build()
        .await
        .unwrap();

    let request = ask("sk-1");
    let results = futures::future::join_all((0..5).map(|_| client.send(&request))).await;

    assert!(results.iter().all(|r| r.as_ref().unwrap().results == "once"));
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn without_single_flight_concurrent_misses_all_call_out() {
    let adapter = Arc::new(ScriptedAdapter::answering("many").with_delay(Duration::from_millis(100)));
    let client = memory_client(adapter.clone()).await;

    let request = ask("sk-1");
    futures::future::join_all((0..3).map(|_| client.send(&request))).await;

    assert_eq!(adapter.calls(), 3);
}

#[tokio::test]
async fn flush_cache_forces_a_new_call() {
    let adapter = Arc::new(ScriptedAdapter::answering("hi"));
    let client = memory_client(adapter.clone()).await;

    client.send(&ask("sk-1")).await.unwrap();
    client.flush_cache().await;
    client.send(&ask("sk-1")).await.unwrap();

    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn batch_results_keep_request_order() {
    let adapter = Arc::new(ScriptedAdapter::answering("ok"));
    let client = LlmClient::builder()
        .with_registry(registry_with("mock", adapter))
        .build()
        .await
        .unwrap();

    let requests = vec![
        ask("sk-1"),
        NormalizedRequest::new("nobody", "sk-1", "hi"),
        ask("sk-2"),
    ];
    let results = client.send_batch(&requests, Some(2)).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].as_ref().unwrap_err().is_configuration());
    assert!(results[2].is_ok());
}

#[tokio::test(start_paused = true)]
async fn interface_defaults_apply_under_call_options() {
    let adapter = Arc::new(ScriptedAdapter::new(vec![status(500), status(500)]));
    let client = LlmClient::builder()
        .with_registry(registry_with("mock", adapter.clone()))
        .with_interface_defaults(InterfaceOptions::new().with_retry_attempts(1))
        .build()
        .await
        .unwrap();

    let result = client.send(&ask("sk-1")).await.unwrap();
    assert_eq!(result.success, Some(false));
    assert_eq!(adapter.calls(), 1);

    // the call's own budget wins over the default
    let result = client
        .send(&ask("sk-1").with_interface_options(InterfaceOptions::new().with_retry_attempts(2)))
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(adapter.calls(), 3);
}

#[tokio::test]
async fn file_cache_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        cache: CacheKind::File,
        cache_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let adapter = Arc::new(ScriptedAdapter::answering("persisted"));
    let client = LlmClient::builder()
        .with_config(&config)
        .unwrap()
        .with_registry(registry_with("mock", adapter.clone()))
        .build()
        .await
        .unwrap();

    let timed = ask("sk-1")
        .with_interface_options(InterfaceOptions::new().with_cache_timeout_seconds(60));
    client.send(&timed).await.unwrap();
    let cached = client.send(&timed).await.unwrap();

    assert_eq!(cached.results, "persisted");
    assert_eq!(adapter.calls(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn empty_registry_rejects_everything() {
    let client = LlmClient::builder()
        .with_registry(ProviderRegistry::new())
        .build()
        .await
        .unwrap();
    assert!(client.send(&ask("sk-1")).await.unwrap_err().is_configuration());
    assert!(client.cache_stats().is_none());
}
