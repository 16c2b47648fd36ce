//! Wall clock used for entry expiry.
//!
//! Expiry stamps are unix milliseconds so they survive a process restart
//! when written to disk.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-driven clock for tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub(crate) fn default_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Absolute expiry for a TTL, `None` meaning "never".
pub(crate) fn expiry_from(clock: &dyn Clock, ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|t| clock.now_ms().saturating_add(t.as_millis() as u64))
}

pub(crate) fn is_expired(clock: &dyn Clock, expiry: Option<u64>) -> bool {
    match expiry {
        Some(at) => clock.now_ms() >= at,
        None => false,
    }
}
