//! 弹性模块：按 HTTP 状态分类失败并以线性递增退避重试。
//!
//! # Resilience Module
//!
//! Every provider call runs inside [`retry_with_backoff`]. The scheduler
//! avoids hammering providers on client errors, honours server-provided
//! backoff hints, and rides out transient 5xx noise.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`FailureClass`] | Status → fatal / rate-limited / transient / unknown |
//! | [`RetryConfig`] | Attempt budget and delay multiplier |
//! | [`retry_with_backoff`] | The retry loop itself |
//! | [`progressive_delay`] | `(attempt + 1) * multiplier * 1000 + 500` ms |
//!
//! ## Example
//!
//! ```rust
//! use llm_facade::client::adapter::{AdapterError, AdapterResponse};
//! use llm_facade::resilience::{retry_with_backoff, RetryConfig};
//!
//! # tokio_test::block_on(async {
//! let result = retry_with_backoff(
//!     || async { Ok::<_, AdapterError>(AdapterResponse::new("pong")) },
//!     &RetryConfig::new(3, 0.3),
//! )
//! .await
//! .unwrap();
//! assert_eq!(result.results, "pong");
//! assert_eq!(result.retries, 0);
//! # });
//! ```

pub mod classify;
pub mod retry;

pub use classify::FailureClass;
pub use retry::{
    progressive_delay, retry_with_backoff, RetryConfig, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_MULTIPLIER,
};
