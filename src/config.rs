//! 客户端配置：YAML 文件加环境变量覆盖。
//!
//! # Configuration
//!
//! [`ClientConfig`] can be loaded from YAML and then overridden from the
//! environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `LLM_FACADE_CACHE` | `cache` (`none`, `memory`, `file`) |
//! | `LLM_FACADE_CACHE_DIR` | `cache_dir` |
//! | `LLM_FACADE_CACHE_MAX_ENTRIES` | `cache_max_entries` |
//! | `LLM_FACADE_RETRY_ATTEMPTS` | `retry_attempts` |
//! | `LLM_FACADE_RETRY_MULTIPLIER` | `retry_multiplier` |
//! | `LLM_FACADE_HTTP_TIMEOUT_SECS` | `http_timeout_secs` |
//! | `LLM_FACADE_SINGLE_FLIGHT` | `single_flight` (`1`/`true`) |
//!
//! ```rust
//! use llm_facade::config::{CacheKind, ClientConfig};
//!
//! let config = ClientConfig::from_yaml_str("cache: memory\nretry_attempts: 5\n").unwrap();
//! assert_eq!(config.cache, CacheKind::Memory);
//! assert_eq!(config.retry_attempts, 5);
//! ```

use crate::resilience::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_MULTIPLIER};
use crate::types::InterfaceOptions;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    None,
    /// Client-lifetime memory cache, no expiry.
    Memory,
    /// Hashed files under `cache_dir`, TTL from `cacheTimeoutSeconds`.
    File,
}

impl FromStr for CacheKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "off" => Ok(CacheKind::None),
            "memory" => Ok(CacheKind::Memory),
            "file" => Ok(CacheKind::File),
            other => Err(Error::configuration_with_context(
                format!("Unknown cache kind: {}", other),
                ErrorContext::new()
                    .with_field_path("cache")
                    .with_details("expected none, memory or file"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cache: CacheKind,
    pub cache_dir: Option<PathBuf>,
    pub cache_max_entries: Option<usize>,
    /// Expired-entry sweep period for the file cache. Unset disables the sweeper.
    pub sweep_interval_secs: Option<u64>,
    pub retry_attempts: u32,
    pub retry_multiplier: f64,
    pub http_timeout_secs: u64,
    pub single_flight: bool,
    /// Applied under every call's own interface options.
    pub interface_defaults: InterfaceOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache: CacheKind::None,
            cache_dir: None,
            cache_max_entries: None,
            sweep_interval_secs: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_multiplier: DEFAULT_RETRY_MULTIPLIER,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            single_flight: false,
            interface_defaults: InterfaceOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid client config: {}", e),
                ErrorContext::new().with_source("client_config"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Cannot read client config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("client_config"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Defaults overridden by `LLM_FACADE_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LLM_FACADE_CACHE") {
            self.cache = v.parse()?;
        }
        if let Some(v) = lookup("LLM_FACADE_CACHE_DIR").filter(|v| !v.trim().is_empty()) {
            self.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(n) = parse_var(&lookup, "LLM_FACADE_CACHE_MAX_ENTRIES")? {
            self.cache_max_entries = Some(n);
        }
        if let Some(n) = parse_var(&lookup, "LLM_FACADE_RETRY_ATTEMPTS")? {
            self.retry_attempts = n;
        }
        if let Some(m) = parse_var::<f64, _>(&lookup, "LLM_FACADE_RETRY_MULTIPLIER")? {
            self.retry_multiplier = m;
        }
        if let Some(n) = parse_var(&lookup, "LLM_FACADE_HTTP_TIMEOUT_SECS")? {
            self.http_timeout_secs = n;
        }
        if let Some(v) = lookup("LLM_FACADE_SINGLE_FLIGHT") {
            self.single_flight = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(self)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Fail fast on combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.cache == CacheKind::File && self.cache_dir.is_none() {
            return Err(Error::configuration_with_context(
                "file cache requires cache_dir",
                ErrorContext::new()
                    .with_field_path("cache_dir")
                    .with_source("client_config"),
            ));
        }
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 0.0 {
            return Err(Error::configuration_with_context(
                format!("retry_multiplier must be a non-negative number, got {}", self.retry_multiplier),
                ErrorContext::new()
                    .with_field_path("retry_multiplier")
                    .with_source("client_config"),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid value for {}: {}", name, e),
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(raw.clone())
                    .with_source("client_config"),
            )
        }),
    }
}
