//! Provider registry: a static table from provider id to adapter factory.

use super::adapter::ProviderAdapter;
use crate::types::Credential;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an adapter bound to one credential.
pub type AdapterFactory =
    Arc<dyn Fn(&Credential) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a provider.
    pub fn register<F>(&mut self, provider_id: impl Into<String>, factory: F)
    where
        F: Fn(&Credential) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync + 'static,
    {
        self.factories.insert(provider_id.into(), Arc::new(factory));
    }

    pub fn with_provider<F>(mut self, provider_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Credential) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync + 'static,
    {
        self.register(provider_id, factory);
        self
    }

    /// Register an OpenAI-compatible HTTP provider rooted at `base_url`.
    #[cfg(feature = "http")]
    pub fn with_openai_compatible(
        self,
        provider_id: impl Into<String>,
        config: crate::transport::HttpConfig,
    ) -> Self {
        self.with_provider(provider_id, move |credential: &Credential| {
            let adapter = crate::transport::HttpAdapter::new(config.clone(), credential)?;
            Ok(Arc::new(adapter) as Arc<dyn ProviderAdapter>)
        })
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.factories.contains_key(provider_id)
    }

    /// Registered ids, sorted.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate the adapter for `provider_id`.
    pub fn create(&self, provider_id: &str, credential: &Credential) -> Result<Arc<dyn ProviderAdapter>> {
        let factory = self.factories.get(provider_id).ok_or_else(|| {
            Error::configuration_with_context(
                format!("Unknown provider: {}", provider_id),
                ErrorContext::new()
                    .with_field_path("provider_id")
                    .with_details(format!("registered: {:?}", self.provider_ids()))
                    .with_source("provider_registry"),
            )
        })?;
        factory(credential)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}
