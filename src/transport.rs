//! HTTP transport: a generic OpenAI-compatible provider adapter on `reqwest`.
//!
//! Network failures carry no status; HTTP failures carry the status, the
//! parsed body and any `Retry-After` hint, all as [`AdapterError`](crate::client::AdapterError).

pub mod http;

pub use http::{HttpAdapter, HttpConfig};
