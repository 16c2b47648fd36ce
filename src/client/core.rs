use crate::cache::locks::KeyedLocks;
use crate::cache::{CacheKey, CacheKeyBuilder, CacheManager, CacheStats};
use crate::client::adapter::ProviderAdapter;
use crate::client::registry::ProviderRegistry;
use crate::client::validation::{validate_credential, validate_embedding_text, validate_message};
use crate::resilience::{retry_with_backoff, RetryConfig};
use crate::structured::parse_json;
use crate::types::{
    Credential, EmbeddingRequest, InterfaceOptions, MessageInput, NormalizedRequest,
    NormalizedResult, RequestOptions,
};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which cache the client owns.
pub(crate) enum ResponseCache {
    Disabled,
    /// Client-lifetime memory cache: every successful response is cached
    /// without expiry.
    Memory(CacheManager),
    /// TTL store: used only for calls that set `cacheTimeoutSeconds`.
    Store(CacheManager),
}

impl ResponseCache {
    /// `Some(ttl)` when this call should go through the cache.
    fn plan(&self, opts: &InterfaceOptions) -> Option<(&CacheManager, Option<Duration>)> {
        match self {
            ResponseCache::Disabled => None,
            ResponseCache::Memory(m) => Some((m, None)),
            ResponseCache::Store(m) => opts
                .cache_timeout_seconds
                .map(|secs| (m, Some(Duration::from_secs(secs)))),
        }
    }

    fn manager(&self) -> Option<&CacheManager> {
        match self {
            ResponseCache::Disabled => None,
            ResponseCache::Memory(m) | ResponseCache::Store(m) => Some(m),
        }
    }
}

/// Unified LLM client.
///
/// Cheap to share behind an `Arc`; all interior state is synchronized.
pub struct LlmClient {
    pub(crate) registry: ProviderRegistry,
    pub(crate) cache: ResponseCache,
    pub(crate) retry: RetryConfig,
    pub(crate) defaults: InterfaceOptions,
    pub(crate) credentials: RwLock<HashMap<String, Credential>>,
    /// One adapter per (provider id, credential fingerprint).
    pub(crate) adapters: Mutex<HashMap<(String, String), Arc<dyn ProviderAdapter>>>,
    pub(crate) flights: Option<KeyedLocks>,
    pub(crate) sweeper: Option<JoinHandle<()>>,
}

impl LlmClient {
    pub fn builder() -> crate::client::LlmClientBuilder {
        crate::client::LlmClientBuilder::new()
    }

    /// Store the credential used by [`send_message`](Self::send_message) and
    /// by embeddings fallback for `provider_id`.
    pub fn set_api_key(&self, provider_id: impl Into<String>, credential: impl Into<Credential>) {
        let mut creds = match self.credentials.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        creds.insert(provider_id.into(), credential.into());
    }

    fn stored_credential(&self, provider_id: &str) -> Option<Credential> {
        let creds = match self.credentials.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        creds.get(provider_id).cloned()
    }

    /// Send using the credential registered with [`set_api_key`](Self::set_api_key).
    pub async fn send_message(
        &self,
        provider_id: &str,
        message: impl Into<MessageInput>,
        options: RequestOptions,
        interface_options: InterfaceOptions,
    ) -> Result<NormalizedResult> {
        let credential = self.stored_credential(provider_id).ok_or_else(|| {
            Error::configuration_with_context(
                format!("No API key set for provider {}", provider_id),
                ErrorContext::new()
                    .with_field_path("credential")
                    .with_details("call set_api_key first")
                    .with_source("llm_client"),
            )
        })?;
        let request = NormalizedRequest::new(provider_id, credential, message)
            .with_options(options)
            .with_interface_options(interface_options);
        self.send(&request).await
    }

    /// Run one chat request: validate, consult the cache, call the provider
    /// under the retry scheduler, post-process and write through.
    ///
    /// Fatal provider errors come back as `Err(Error::Remote)`; a spent
    /// retry budget comes back as `Ok` with `success: Some(false)`.
    pub async fn send(&self, request: &NormalizedRequest) -> Result<NormalizedResult> {
        let request_id = Uuid::new_v4().to_string();
        validate_message(&request.message)?;
        validate_credential(&request.provider_id, &request.credential)?;
        self.ensure_registered(&request.provider_id)?;

        let opts = request.interface_options.merged_over(&self.defaults);
        let plan = self.cache.plan(&opts);
        let key = plan.map(|_| CacheKeyBuilder::for_request(request));

        let _flight = self.enter_flight(key.as_ref()).await;
        if let (Some((cache, _)), Some(key)) = (plan, key.as_ref()) {
            if let Some(hit) = cache.get::<NormalizedResult>(key).await {
                info!(
                    request_id = request_id.as_str(),
                    provider = request.provider_id.as_str(),
                    cache_key = %key,
                    "served from cache"
                );
                return Ok(hit);
            }
        }

        let adapter = self.adapter_for(&request.provider_id, &request.credential)?;
        let payload = request.message.to_message_object();
        let retry = self.retry.overridden_by(&opts);
        debug!(
            request_id = request_id.as_str(),
            provider = request.provider_id.as_str(),
            attempts = retry.retry_attempts,
            "dispatching request"
        );

        let mut result = retry_with_backoff(
            || adapter.send_message(&payload, &request.options, &opts),
            &retry,
        )
        .await
        .map_err(|e| {
            warn!(
                request_id = request_id.as_str(),
                provider = request.provider_id.as_str(),
                http_status = e.status(),
                error = %e,
                "request failed"
            );
            e
        })?;

        post_process(&mut result, &request.options, &opts);
        info!(
            request_id = request_id.as_str(),
            provider = request.provider_id.as_str(),
            retries = result.retries,
            success = result.is_success(),
            total_time = result.total_time.as_str(),
            "request completed"
        );

        if let (Some((cache, ttl)), Some(key)) = (plan, key.as_ref()) {
            write_through(cache, key, &result, ttl).await;
        }
        Ok(result)
    }

    /// Send many requests with bounded concurrency (default 10). Results
    /// come back in request order; one failure does not stop the others.
    pub async fn send_batch(
        &self,
        requests: &[NormalizedRequest],
        concurrency_limit: Option<usize>,
    ) -> Vec<Result<NormalizedResult>> {
        use futures::StreamExt;

        let limit = concurrency_limit.unwrap_or(10).max(1);
        futures::stream::iter(requests)
            .map(|request| self.send(request))
            .buffered(limit)
            .collect()
            .await
    }

    /// Embed `request.text`. When the provider cannot embed, or the call
    /// fails, `embeddingsDefaultProvider` is tried with its stored credential.
    pub async fn embeddings(&self, request: &EmbeddingRequest) -> Result<NormalizedResult> {
        let outcome = self.embeddings_once(request).await;
        let failed = match &outcome {
            Ok(result) => !result.is_success(),
            Err(Error::Validation { .. }) => false,
            Err(_) => true,
        };
        if !failed {
            return outcome;
        }
        match self.fallback_embedding_request(request) {
            Some(fallback) => {
                warn!(
                    provider = request.provider_id.as_str(),
                    fallback = fallback.provider_id.as_str(),
                    "embeddings failed, using default provider"
                );
                self.embeddings_once(&fallback).await
            }
            None => outcome,
        }
    }

    async fn embeddings_once(&self, request: &EmbeddingRequest) -> Result<NormalizedResult> {
        let request_id = Uuid::new_v4().to_string();
        validate_embedding_text(&request.text)?;
        validate_credential(&request.provider_id, &request.credential)?;
        self.ensure_registered(&request.provider_id)?;

        let opts = request.interface_options.merged_over(&self.defaults);
        let plan = self.cache.plan(&opts);
        let key = plan.map(|_| CacheKeyBuilder::for_embedding(request));

        let _flight = self.enter_flight(key.as_ref()).await;
        if let (Some((cache, _)), Some(key)) = (plan, key.as_ref()) {
            if let Some(hit) = cache.get::<NormalizedResult>(key).await {
                debug!(request_id = request_id.as_str(), cache_key = %key, "embedding served from cache");
                return Ok(hit);
            }
        }

        let adapter = self.adapter_for(&request.provider_id, &request.credential)?;
        if !adapter.supports_embeddings() {
            return Err(Error::configuration_with_context(
                format!("Provider {} does not support embeddings", request.provider_id),
                ErrorContext::new()
                    .with_field_path("provider_id")
                    .with_source("llm_client"),
            ));
        }

        let retry = self.retry.overridden_by(&opts);
        let mut result = retry_with_backoff(
            || adapter.embeddings(&request.text, &request.options, &opts),
            &retry,
        )
        .await?;
        if !opts.include_original_response {
            result.original_response = None;
        }
        info!(
            request_id = request_id.as_str(),
            provider = request.provider_id.as_str(),
            retries = result.retries,
            success = result.is_success(),
            "embedding completed"
        );

        if let (Some((cache, ttl)), Some(key)) = (plan, key.as_ref()) {
            write_through(cache, key, &result, ttl).await;
        }
        Ok(result)
    }

    fn fallback_embedding_request(&self, request: &EmbeddingRequest) -> Option<EmbeddingRequest> {
        let opts = request.interface_options.merged_over(&self.defaults);
        let fallback = opts.embeddings_default_provider?;
        if fallback == request.provider_id {
            return None;
        }
        let Some(credential) = self.stored_credential(&fallback) else {
            warn!(fallback = fallback.as_str(), "no API key set for embeddings fallback provider");
            return None;
        };
        // the model name belongs to the original provider
        let mut options = request.options.clone();
        options.model = None;
        let mut interface_options = request.interface_options.clone();
        interface_options.embeddings_default_provider = None;
        Some(
            EmbeddingRequest::new(fallback, credential, request.text.clone())
                .with_options(options)
                .with_interface_options(interface_options),
        )
    }

    /// Drop every entry from the client's cache.
    pub async fn flush_cache(&self) {
        if let Some(cache) = self.cache.manager() {
            cache.clear().await;
            info!(backend = cache.backend_name(), "cache flushed");
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.manager().map(|m| m.stats())
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Number of pooled adapter instances.
    pub fn adapter_count(&self) -> usize {
        match self.adapters.lock() {
            Ok(pool) => pool.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn ensure_registered(&self, provider_id: &str) -> Result<()> {
        if self.registry.contains(provider_id) {
            return Ok(());
        }
        Err(Error::configuration_with_context(
            format!("Unknown provider: {}", provider_id),
            ErrorContext::new()
                .with_field_path("provider_id")
                .with_source("llm_client"),
        ))
    }

    fn adapter_for(&self, provider_id: &str, credential: &Credential) -> Result<Arc<dyn ProviderAdapter>> {
        let pool_key = (provider_id.to_string(), credential.fingerprint());
        let mut pool = match self.adapters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(adapter) = pool.get(&pool_key) {
            return Ok(adapter.clone());
        }
        let adapter = self.registry.create(provider_id, credential)?;
        debug!(provider = provider_id, credential = pool_key.1.as_str(), "adapter created");
        pool.insert(pool_key, adapter.clone());
        Ok(adapter)
    }

    async fn enter_flight(&self, key: Option<&CacheKey>) -> Option<OwnedMutexGuard<()>> {
        match (&self.flights, key) {
            (Some(flights), Some(key)) => Some(flights.acquire(key.as_str()).await),
            _ => None,
        }
    }
}

impl Drop for LlmClient {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .field("single_flight", &self.flights.is_some())
            .finish()
    }
}

/// JSON response mode and original-response stripping.
fn post_process(result: &mut NormalizedResult, options: &RequestOptions, opts: &InterfaceOptions) {
    if !opts.include_original_response {
        result.original_response = None;
    }
    if !(options.wants_json_object() || opts.attempt_json_repair) {
        return;
    }
    if let Value::String(text) = &result.results {
        match parse_json(text.as_str(), opts.attempt_json_repair) {
            Some(parsed) => result.results = parsed,
            None => debug!("response is not JSON, returning text"),
        }
    }
}

async fn write_through(
    cache: &CacheManager,
    key: &CacheKey,
    result: &NormalizedResult,
    ttl: Option<Duration>,
) {
    if result.is_success() && result.has_results() {
        cache.set_with_ttl(key, result, ttl).await;
    }
}
