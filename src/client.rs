//! 统一客户端：协调缓存、重试、适配器与 JSON 后处理。
//!
//! # Client Module
//!
//! [`LlmClient`] is the single entry point. One call flows through
//! validation, cache lookup, the retry scheduler wrapped around a provider
//! adapter, optional JSON post-processing and finally a cache write.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`LlmClient`] | Per-call orchestration |
//! | [`LlmClientBuilder`] | Cache mode, retry budget, registry, defaults |
//! | [`ProviderRegistry`] | Provider id → adapter factory |
//! | [`ProviderAdapter`] | The narrow interface every provider implements |
//! | [`AdapterError`] | Normalized adapter failure (status, body, `Retry-After`) |

pub mod adapter;
pub mod builder;
pub mod core;
pub mod registry;
mod validation;

pub use adapter::{AdapterError, AdapterResponse, ProviderAdapter};
pub use builder::LlmClientBuilder;
pub use core::LlmClient;
pub use registry::{AdapterFactory, ProviderRegistry};
