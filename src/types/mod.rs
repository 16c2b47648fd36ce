//! 类型系统模块：定义统一请求、选项与标准化结果等核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that crosses the facade:
//! what a caller sends, which knobs it sets, and the normalized shape every
//! provider adapter must produce.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`NormalizedRequest`] | One call: provider, credential, message, options |
//! | [`Credential`] | Single API key or a key pair |
//! | [`MessageInput`] | Plain text prompt or a structured message object |
//! | [`RequestOptions`] | Provider passthrough options (`model`, `max_tokens`, ...) |
//! | [`InterfaceOptions`] | Facade knobs (cache TTL, retry budget, JSON repair, ...) |
//! | [`NormalizedResult`] | The canonical result contract |
//!
//! ## Example
//!
//! ```rust
//! use llm_facade::types::{InterfaceOptions, NormalizedRequest, RequestOptions};
//!
//! let request = NormalizedRequest::new("openai", "sk-test", "Explain backoff in one line.")
//!     .with_options(RequestOptions::new().with_model("gpt-4o-mini").with_max_tokens(64))
//!     .with_interface_options(InterfaceOptions::new().with_retry_attempts(2));
//! assert_eq!(request.provider_id, "openai");
//! ```

pub mod message;
pub mod options;
pub mod request;
pub mod result;

pub use message::{Message, MessageRole};
pub use options::{InterfaceOptions, RequestOptions};
pub use request::{Credential, EmbeddingRequest, MessageInput, NormalizedRequest};
pub use result::NormalizedResult;
