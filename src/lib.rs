//! # llm-facade
//!
//! 面向多家大模型 HTTP API 的统一客户端门面：重试、缓存与 JSON 修复。
//!
//! A unified client facade over independent LLM HTTP APIs. Providers plug in
//! through a narrow adapter trait; the facade supplies the reliability layer
//! every adapter needs.
//!
//! ## Core Pieces
//!
//! - **Retry scheduling**: failures are classified by HTTP status; client
//!   errors fail fast, rate limits honour `Retry-After`, server errors back
//!   off linearly
//! - **Caching**: stable request hashing over pluggable backends (memory LRU,
//!   hashed files, adapters for third-party engines) with lazy TTL expiry
//! - **JSON extraction**: strict parse, fence stripping, brace scanning and
//!   opt-in structural repair for unreliable model output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_facade::client::ProviderRegistry;
//! use llm_facade::transport::HttpConfig;
//! use llm_facade::{InterfaceOptions, LlmClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> llm_facade::Result<()> {
//!     let registry = ProviderRegistry::new()
//!         .with_openai_compatible("openai", HttpConfig::new("https://api.openai.com/v1"));
//!
//!     let client = LlmClient::builder()
//!         .with_registry(registry)
//!         .with_memory_cache()
//!         .with_api_key("openai", "sk-...")
//!         .build()
//!         .await?;
//!
//!     let result = client
//!         .send_message(
//!             "openai",
//!             "Reply with a JSON object describing a cat.",
//!             RequestOptions::new().with_model("gpt-4o-mini").with_response_format("json_object"),
//!             InterfaceOptions::new().with_json_repair(true),
//!         )
//!         .await?;
//!     println!("{}", result.results);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`LlmClient`], its builder, provider registry and adapter trait |
//! | [`cache`] | Cache keys, backends, engine adapters and the cache manager |
//! | [`resilience`] | Failure classification and retry with backoff |
//! | [`structured`] | JSON extraction and repair |
//! | [`types`] | Requests, options and the normalized result |
//! | [`config`] | YAML / environment configuration |
//! | `transport` | OpenAI-compatible HTTP adapter (feature `http`) |

pub mod cache;
pub mod client;
pub mod config;
pub mod resilience;
pub mod structured;
pub mod types;

#[cfg(feature = "http")]
pub mod transport;

// Re-export main types for convenience
pub use client::{AdapterError, AdapterResponse, LlmClient, LlmClientBuilder, ProviderAdapter};
pub use config::ClientConfig;
pub use structured::parse_json;
pub use types::{
    Credential, EmbeddingRequest, InterfaceOptions, Message, MessageInput, MessageRole,
    NormalizedRequest, NormalizedResult, RequestOptions,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
