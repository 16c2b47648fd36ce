use crate::cache::locks::KeyedLocks;
use crate::cache::{CacheBackend, CacheConfig, CacheManager, FileCache, MemoryCache};
use crate::client::core::{LlmClient, ResponseCache};
use crate::client::registry::ProviderRegistry;
use crate::config::{CacheKind, ClientConfig};
use crate::resilience::RetryConfig;
use crate::types::{Credential, InterfaceOptions};
use crate::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tracing::info;

enum CacheChoice {
    Disabled,
    Memory { max_entries: Option<usize> },
    File { dir: PathBuf, max_entries: Option<usize> },
    Backend(Box<dyn CacheBackend>),
}

/// Builder for [`LlmClient`].
///
/// Without any cache call the client does not cache. `with_memory_cache`
/// caches every successful response for the client's lifetime; the file and
/// custom-backend modes only cache calls that set `cacheTimeoutSeconds`.
pub struct LlmClientBuilder {
    registry: ProviderRegistry,
    cache: CacheChoice,
    retry: RetryConfig,
    defaults: InterfaceOptions,
    single_flight: bool,
    sweep_interval: Option<Duration>,
    credentials: HashMap<String, Credential>,
    #[cfg_attr(not(feature = "http"), allow(dead_code))]
    http_timeout: Option<Duration>,
    #[cfg(feature = "http")]
    http_endpoints: Vec<(String, crate::transport::HttpConfig)>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::new(),
            cache: CacheChoice::Disabled,
            retry: RetryConfig::default(),
            defaults: InterfaceOptions::default(),
            single_flight: false,
            sweep_interval: None,
            credentials: HashMap::new(),
            http_timeout: None,
            #[cfg(feature = "http")]
            http_endpoints: Vec::new(),
        }
    }

    /// Take cache mode, retry budget, single-flight, HTTP timeout and
    /// interface defaults from a [`ClientConfig`]. Later `with_*` calls still
    /// win.
    pub fn with_config(mut self, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        self.cache = match config.cache {
            CacheKind::None => CacheChoice::Disabled,
            CacheKind::Memory => CacheChoice::Memory {
                max_entries: config.cache_max_entries,
            },
            CacheKind::File => CacheChoice::File {
                // validate() guarantees a directory
                dir: config.cache_dir.clone().unwrap_or_default(),
                max_entries: config.cache_max_entries,
            },
        };
        self.retry = RetryConfig::new(config.retry_attempts, config.retry_multiplier);
        self.defaults = config.interface_defaults.clone();
        self.single_flight = config.single_flight;
        self.sweep_interval = config.sweep_interval_secs.map(Duration::from_secs);
        self.http_timeout = Some(config.http_timeout());
        Ok(self)
    }

    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_memory_cache(mut self) -> Self {
        self.cache = CacheChoice::Memory { max_entries: None };
        self
    }

    pub fn with_file_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = CacheChoice::File {
            dir: dir.into(),
            max_entries: None,
        };
        self
    }

    /// Any backend (including engine adapters) as the TTL store.
    pub fn with_cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache = CacheChoice::Backend(backend);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = CacheChoice::Disabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_interface_defaults(mut self, defaults: InterfaceOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Coalesce concurrent misses on the same cache key into one provider call.
    pub fn with_single_flight(mut self, enable: bool) -> Self {
        self.single_flight = enable;
        self
    }

    /// Periodically purge expired entries from the TTL store.
    pub fn with_sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = Some(every);
        self
    }

    /// Request timeout for endpoints added with `with_openai_compatible`
    /// that do not set their own.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Register an OpenAI-compatible endpoint on top of the registry. It is
    /// added at build time, picking up the client-wide HTTP timeout.
    #[cfg(feature = "http")]
    pub fn with_openai_compatible(
        mut self,
        provider_id: impl Into<String>,
        config: crate::transport::HttpConfig,
    ) -> Self {
        self.http_endpoints.push((provider_id.into(), config));
        self
    }

    pub fn with_api_key(mut self, provider_id: impl Into<String>, credential: impl Into<Credential>) -> Self {
        self.credentials.insert(provider_id.into(), credential.into());
        self
    }

    /// Build the client. Opening a file cache touches the filesystem, and
    /// the sweeper is spawned on the current runtime.
    pub async fn build(self) -> Result<LlmClient> {
        let cache = match self.cache {
            CacheChoice::Disabled => ResponseCache::Disabled,
            CacheChoice::Memory { max_entries } => {
                let backend = match max_entries {
                    Some(n) => MemoryCache::new(n),
                    None => MemoryCache::unbounded(),
                };
                ResponseCache::Memory(CacheManager::new(CacheConfig::default(), Box::new(backend)))
            }
            CacheChoice::File { dir, max_entries } => {
                let mut backend = FileCache::open(dir).await?;
                if let Some(n) = max_entries {
                    backend = backend.with_max_entries(n);
                }
                ResponseCache::Store(CacheManager::new(CacheConfig::default(), Box::new(backend)))
            }
            CacheChoice::Backend(backend) => {
                ResponseCache::Store(CacheManager::new(CacheConfig::default(), backend))
            }
        };

        let sweeper = match (&cache, self.sweep_interval) {
            (ResponseCache::Store(manager), Some(every)) => Some(manager.spawn_sweeper(every)),
            _ => None,
        };

        #[cfg_attr(not(feature = "http"), allow(unused_mut))]
        let mut registry = self.registry;
        #[cfg(feature = "http")]
        for (provider_id, mut endpoint) in self.http_endpoints {
            if endpoint.timeout.is_none() {
                endpoint.timeout = self.http_timeout;
            }
            registry = registry.with_openai_compatible(provider_id, endpoint);
        }

        info!(
            providers = registry.len(),
            cache = cache_label(&cache),
            retry_attempts = self.retry.retry_attempts,
            single_flight = self.single_flight,
            "llm client ready"
        );

        Ok(LlmClient {
            registry,
            cache,
            retry: self.retry,
            defaults: self.defaults,
            credentials: RwLock::new(self.credentials),
            adapters: Mutex::new(HashMap::new()),
            flights: self.single_flight.then(KeyedLocks::new),
            sweeper,
        })
    }
}

fn cache_label(cache: &ResponseCache) -> &'static str {
    match cache {
        ResponseCache::Disabled => "none",
        ResponseCache::Memory(_) => "memory",
        ResponseCache::Store(m) => m.backend_name(),
    }
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
