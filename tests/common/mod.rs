//! Shared fixtures: a provider adapter that replays a scripted sequence of
//! outcomes and counts how often it was called.

#![allow(dead_code)]

use async_trait::async_trait;
use llm_facade::client::{AdapterError, AdapterResponse, ProviderAdapter, ProviderRegistry};
use llm_facade::{Credential, InterfaceOptions, RequestOptions};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Outcome = Result<AdapterResponse, AdapterError>;

/// Route library logs to the test harness; `RUST_LOG=llm_facade=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ok(results: impl Into<Value>) -> Outcome {
    Ok(AdapterResponse::new(results))
}

pub fn status(code: u16) -> Outcome {
    Err(AdapterError::http(code, format!("upstream said {}", code)))
}

pub fn rate_limited(retry_after: Duration) -> Outcome {
    Err(AdapterError::http(429, "slow down").with_retry_after(retry_after))
}

/// Replays `script` front to back; once it runs dry every call answers with
/// `fallback`.
pub struct ScriptedAdapter {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    embeddings: bool,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub last_message: Mutex<Option<Value>>,
}

impl ScriptedAdapter {
    pub fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: ok("default reply"),
            embeddings: false,
            delay: None,
            calls: AtomicUsize::new(0),
            last_message: Mutex::new(None),
        }
    }

    pub fn answering(reply: impl Into<Value>) -> Self {
        let mut a = Self::new(Vec::new());
        a.fallback = ok(reply);
        a
    }

    pub fn with_embeddings(mut self) -> Self {
        self.embeddings = true;
        self
    }

    /// Every call takes this long (in tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn send_message(
        &self,
        message: &Value,
        _options: &RequestOptions,
        _interface_options: &InterfaceOptions,
    ) -> Outcome {
        *self.last_message.lock().unwrap() = Some(message.clone());
        self.next().await
    }

    async fn embeddings(
        &self,
        _text: &str,
        _options: &RequestOptions,
        _interface_options: &InterfaceOptions,
    ) -> Outcome {
        self.next().await
    }

    fn supports_embeddings(&self) -> bool {
        self.embeddings
    }
}

/// Registry serving the same adapter instance for every credential.
pub fn registry_with(provider_id: &str, adapter: Arc<ScriptedAdapter>) -> ProviderRegistry {
    ProviderRegistry::new().with_provider(provider_id, move |_: &Credential| {
        Ok(adapter.clone() as Arc<dyn ProviderAdapter>)
    })
}

/// Registry building a fresh adapter per credential, reporting each
/// construction through `built`.
pub fn counting_registry(provider_id: &str, built: Arc<AtomicUsize>) -> ProviderRegistry {
    ProviderRegistry::new().with_provider(provider_id, move |_: &Credential| {
        built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedAdapter::answering("fresh")) as Arc<dyn ProviderAdapter>)
    })
}
