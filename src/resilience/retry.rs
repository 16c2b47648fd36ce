//! Retry with linear progressive backoff.
//!
//! Wraps one provider call. Failures are classified by HTTP status (see
//! [`FailureClass`]); fatal ones are raised on the spot, retryable ones are
//! slept on and tried again until the attempt budget is spent.
//!
//! The computed delay is `(attempt + 1) * multiplier * 1000 + 500` ms, linear
//! in the attempt number. Providers differ in how quickly they recover, so
//! callers tune `multiplier` per provider rather than changing the shape.

use super::classify::FailureClass;
use crate::client::adapter::{AdapterError, AdapterResponse};
use crate::types::result::{format_millis, is_truthy};
use crate::types::{InterfaceOptions, NormalizedResult};
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 0.3;

/// Fixed part of every computed delay.
const BASE_DELAY_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub retry_attempts: u32,
    pub retry_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_multiplier: DEFAULT_RETRY_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    pub fn new(retry_attempts: u32, retry_multiplier: f64) -> Self {
        Self {
            retry_attempts,
            retry_multiplier,
        }
    }

    /// Take the budget from interface options, falling back to `self` for
    /// unset fields.
    pub fn overridden_by(&self, opts: &InterfaceOptions) -> Self {
        Self {
            retry_attempts: opts.retry_attempts.unwrap_or(self.retry_attempts),
            retry_multiplier: opts.retry_multiplier.unwrap_or(self.retry_multiplier),
        }
    }
}

/// Mutable per-call retry bookkeeping.
#[derive(Debug)]
struct RetryState {
    attempts_remaining: u32,
    /// 0-based index of the attempt in flight.
    current_attempt: u32,
    multiplier: f64,
}

impl RetryState {
    fn new(config: &RetryConfig) -> Self {
        let multiplier = if config.retry_multiplier.is_finite() && config.retry_multiplier >= 0.0 {
            config.retry_multiplier
        } else {
            DEFAULT_RETRY_MULTIPLIER
        };
        Self {
            attempts_remaining: config.retry_attempts,
            current_attempt: 0,
            multiplier,
        }
    }

    fn advance(&mut self) {
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        self.current_attempt = self.current_attempt.saturating_add(1);
    }
}

/// Delay before retrying after the failure of `attempt` (0-based).
pub fn progressive_delay(attempt: u32, multiplier: f64) -> Duration {
    let ms = (attempt as f64 + 1.0) * multiplier * 1000.0 + BASE_DELAY_MS;
    Duration::from_millis(ms.max(0.0).round() as u64)
}

/// Run `op` until it yields a non-empty result, a fatal error is raised, or
/// the attempt budget runs out.
///
/// - Success: `results` set, `retries` = failed attempts before it,
///   `total_time` measured from the first call and `request_time` from the
///   start of the winning attempt.
/// - Fatal (`400/401/403/404`) or unclassified failure: `Err(Error::Remote)`
///   carrying the 1-based attempt number.
/// - Budget exhausted on retryable failures: `Ok` with `success: Some(false)`.
pub async fn retry_with_backoff<F, Fut>(mut op: F, config: &RetryConfig) -> Result<NormalizedResult>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<AdapterResponse, AdapterError>>,
{
    let start = Instant::now();
    let mut state = RetryState::new(config);
    let mut last_error: Option<String> = None;

    while state.attempts_remaining > 0 {
        let attempt_start = Instant::now();
        match op().await {
            Ok(resp) if is_truthy(&resp.results) => {
                debug!(
                    attempt = state.current_attempt + 1,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "provider call succeeded"
                );
                return Ok(NormalizedResult {
                    results: resp.results,
                    original_response: resp.original_response,
                    total_time: format_millis(start.elapsed()),
                    request_time: format_millis(attempt_start.elapsed()),
                    retries: state.current_attempt,
                    success: None,
                    error: None,
                });
            }
            Ok(_) => {
                debug!(attempt = state.current_attempt + 1, "provider returned an empty result");
                last_error = Some("provider returned an empty result".to_string());
            }
            Err(err) => {
                let class = FailureClass::from_status(err.status_code);
                if !class.retryable() {
                    warn!(
                        http_status = err.status_code,
                        error_class = class.as_str(),
                        attempt = state.current_attempt + 1,
                        "provider call failed, not retrying"
                    );
                    return Err(fatal(err, class, state.current_attempt + 1));
                }

                let delay = match err.retry_after {
                    Some(hint) if class.honours_retry_after() => hint,
                    _ => progressive_delay(state.current_attempt, state.multiplier),
                };
                last_error = Some(describe(&err));
                let last_attempt = state.attempts_remaining <= 1;
                info!(
                    http_status = err.status_code,
                    error_class = class.as_str(),
                    attempt = state.current_attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    last_attempt,
                    "provider call failed, backing off"
                );
                // no point sleeping when nothing follows
                if !last_attempt {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        state.advance();
    }

    let message = last_error.unwrap_or_else(|| "no attempts were made".to_string());
    warn!(retries = state.current_attempt, error = message.as_str(), "retry budget exhausted");
    Ok(NormalizedResult::exhausted(
        message,
        format_millis(start.elapsed()),
        state.current_attempt,
    ))
}

fn fatal(err: AdapterError, class: FailureClass, attempt: u32) -> Error {
    let status = match class {
        FailureClass::Fatal => err.status_code,
        _ => None,
    };
    Error::Remote {
        status,
        class,
        message: err.message.clone(),
        body: err.body.clone(),
        attempt,
        source: err,
    }
}

fn describe(err: &AdapterError) -> String {
    match err.status_code {
        Some(s) => format!("HTTP {}: {}", s, err.message),
        None => err.message.clone(),
    }
}
