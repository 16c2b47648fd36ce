use crate::client::adapter::{AdapterError, AdapterResponse, ProviderAdapter};
use crate::types::{Credential, InterfaceOptions, RequestOptions};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Unset: the client-wide timeout when registered through
    /// [`LlmClientBuilder::with_openai_compatible`](crate::LlmClientBuilder::with_openai_compatible),
    /// otherwise [`DEFAULT_HTTP_TIMEOUT_SECS`](crate::config::DEFAULT_HTTP_TIMEOUT_SECS).
    pub timeout: Option<Duration>,
    pub chat_path: String,
    pub embeddings_path: String,
    /// Used when the request options carry no `model`.
    pub default_model: Option<String>,
    pub pool_max_idle_per_host: usize,
    pub proxy_url: Option<String>,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            chat_path: "chat/completions".to_string(),
            embeddings_path: "embeddings".to_string(),
            default_model: None,
            pool_max_idle_per_host: 32,
            proxy_url: std::env::var("LLM_FACADE_PROXY_URL").ok(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn effective_timeout(&self) -> Duration {
        self.timeout
            .unwrap_or(Duration::from_secs(crate::config::DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    pub fn with_embeddings_path(mut self, path: impl Into<String>) -> Self {
        self.embeddings_path = path.into();
        self
    }
}

/// Adapter for any provider speaking the OpenAI chat-completions and
/// embeddings wire format.
///
/// A key credential is sent as a bearer token. A pair sends the first half
/// as the bearer token and the second as `OpenAI-Organization`.
pub struct HttpAdapter {
    client: reqwest::Client,
    chat_url: Url,
    embeddings_url: Url,
    credential: Credential,
    default_model: Option<String>,
}

impl HttpAdapter {
    pub fn new(config: HttpConfig, credential: &Credential) -> Result<Self> {
        let base = parse_base_url(&config.base_url)?;
        let chat_url = join(&base, &config.chat_path)?;
        let embeddings_url = join(&base, &config.embeddings_path)?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.effective_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)));
        if let Some(proxy_url) = &config.proxy_url {
            if let Ok(proxy) = Proxy::all(proxy_url) {
                builder = builder.proxy(proxy);
            }
        }
        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("Cannot build HTTP client: {}", e),
                ErrorContext::new().with_source("http_adapter"),
            )
        })?;

        Ok(Self {
            client,
            chat_url,
            embeddings_url,
            credential: credential.clone(),
            default_model: config.default_model,
        })
    }

    /// Message object fields first, then passthrough options.
    fn chat_body(&self, message: &Value, options: &RequestOptions) -> Value {
        let mut body = match message {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("messages".to_string(), other.clone());
                map
            }
        };
        self.merge_options(&mut body, options);
        if options.wants_json_object() {
            body.insert("response_format".to_string(), json!({"type": "json_object"}));
        }
        Value::Object(body)
    }

    fn embeddings_body(&self, text: &str, options: &RequestOptions) -> Value {
        let mut body = Map::new();
        body.insert("input".to_string(), Value::String(text.to_string()));
        self.merge_options(&mut body, options);
        body.remove("response_format");
        Value::Object(body)
    }

    fn merge_options(&self, body: &mut Map<String, Value>, options: &RequestOptions) {
        if let Ok(Value::Object(opts)) = serde_json::to_value(options) {
            for (k, v) in opts {
                body.entry(k).or_insert(v);
            }
        }
        if !body.contains_key("model") {
            if let Some(model) = &self.default_model {
                body.insert("model".to_string(), Value::String(model.clone()));
            }
        }
    }

    async fn post(&self, url: &Url, body: &Value) -> std::result::Result<Value, AdapterError> {
        let mut req = self
            .client
            .post(url.clone())
            .bearer_auth(self.credential.primary())
            .json(body);
        if let Some(org) = self.credential.secondary() {
            req = req.header("OpenAI-Organization", org);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AdapterError::network(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        debug!(http_status = status.as_u16(), url = %url, "provider responded");
        if !status.is_success() {
            let headers = resp.headers().clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::from_http(status.as_u16(), &headers, &text));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| AdapterError::network(format!("reading response body failed: {}", e)))?;
        serde_json::from_str::<Value>(&text).map_err(|e| {
            AdapterError::new(format!("provider returned invalid JSON: {}", e))
                .with_body(Value::String(text))
        })
    }
}

#[async_trait]
impl ProviderAdapter for HttpAdapter {
    async fn send_message(
        &self,
        message: &Value,
        options: &RequestOptions,
        _interface_options: &InterfaceOptions,
    ) -> std::result::Result<AdapterResponse, AdapterError> {
        let body = self.chat_body(message, options);
        let raw = self.post(&self.chat_url, &body).await?;
        let content = raw
            .pointer("/choices/0/message/content")
            .cloned()
            .ok_or_else(|| {
                AdapterError::new("response has no choices[0].message.content").with_body(raw.clone())
            })?;
        Ok(AdapterResponse::new(content).with_original(raw))
    }

    async fn embeddings(
        &self,
        text: &str,
        options: &RequestOptions,
        _interface_options: &InterfaceOptions,
    ) -> std::result::Result<AdapterResponse, AdapterError> {
        let body = self.embeddings_body(text, options);
        let raw = self.post(&self.embeddings_url, &body).await?;
        let embedding = raw
            .pointer("/data/0/embedding")
            .cloned()
            .ok_or_else(|| AdapterError::new("response has no data[0].embedding").with_body(raw.clone()))?;
        Ok(AdapterResponse::new(embedding).with_original(raw))
    }

    fn supports_embeddings(&self) -> bool {
        true
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    // a trailing slash keeps the last path segment when joining
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| {
        Error::configuration_with_context(
            format!("Invalid base URL: {}", e),
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(raw.to_string())
                .with_source("http_adapter"),
        )
    })
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path.trim_start_matches('/')).map_err(|e| {
        Error::configuration_with_context(
            format!("Invalid endpoint path: {}", e),
            ErrorContext::new()
                .with_details(path.to_string())
                .with_source("http_adapter"),
        )
    })
}
