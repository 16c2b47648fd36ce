//! HTTP failure classification.
//!
//! | Class | Statuses | Behavior |
//! |-------|----------|----------|
//! | `Fatal` | 400, 401, 403, 404 | raise immediately |
//! | `RateLimited` | 429, 503 | honour `Retry-After`, else progressive delay |
//! | `Transient` | 500, 502, 504 | progressive delay |
//! | `UnknownFatal` | anything else, or no status | raise immediately as "Unknown" |

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    Fatal,
    RateLimited,
    Transient,
    UnknownFatal,
}

impl FailureClass {
    /// Classify an adapter failure by its HTTP status.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(400 | 401 | 403 | 404) => Self::Fatal,
            Some(429 | 503) => Self::RateLimited,
            Some(500 | 502 | 504) => Self::Transient,
            _ => Self::UnknownFatal,
        }
    }

    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }

    /// Whether a server-supplied `Retry-After` should replace computed backoff.
    #[inline]
    pub fn honours_retry_after(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "client_error",
            Self::RateLimited => "rate_limited",
            Self::Transient => "server_error",
            Self::UnknownFatal => "unknown",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
