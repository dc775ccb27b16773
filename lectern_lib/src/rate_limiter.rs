//! Per-key sliding-window rate limiter.
//!
//! Each key keeps the instants of its admitted events in a `VecDeque`. A check
//! prunes everything that has left the trailing window and admits the event
//! only while fewer than `max_requests` remain. Rejected events are not
//! recorded, so hammering a throttled key does not extend its lockout.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitExceeded;

/// Default budget per window.
const DEFAULT_MAX_REQUESTS: u64 = 60;

/// Default sliding window duration.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of limiter decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub admitted: u64,
    pub rejected: u64,
}

/// Sliding-window rate limiter keyed by an arbitrary identity (user id, IP, ...).
///
/// The read-prune-append sequence for a key runs under that key's `DashMap`
/// shard lock, so concurrent checks of the same key cannot over-admit.
pub struct RateLimiter {
    records: DashMap<String, VecDeque<Instant>>,
    max_requests: u64,
    time_window: Duration,
    clock: Arc<dyn Clock>,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

/// Drops instants whose age is at least `window`. An event exactly `window`
/// old no longer counts.
fn prune(events: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while events
        .front()
        .is_some_and(|&t| now.saturating_duration_since(t) >= window)
    {
        events.pop_front();
    }
}

impl RateLimiter {
    /// Create a rate limiter with explicit budget and window.
    pub fn new(max_requests: u64, time_window: Duration) -> Self {
        Self::with_clock(max_requests, time_window, Arc::new(SystemClock))
    }

    /// Create a rate limiter that reads time from `clock`.
    pub fn with_clock(max_requests: u64, time_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            max_requests,
            time_window,
            clock,
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Checks `key` and records the event if it is admitted.
    ///
    /// Returns `true` when the caller must be throttled. In that case the
    /// pruned history is stored but the attempt itself is not counted.
    pub fn is_rate_limited(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut events = self.records.entry(key.to_owned()).or_default();
        prune(&mut events, now, self.time_window);

        if events.len() as u64 >= self.max_requests {
            drop(events);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key, max_requests = self.max_requests, "rate limit exceeded");
            return true;
        }

        events.push_back(now);
        let used = events.len();
        drop(events);
        self.admitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, used, max_requests = self.max_requests, "request admitted");
        false
    }

    /// Discards the whole history of `key`.
    pub fn reset(&self, key: &str) {
        self.records.remove(key);
    }

    /// Remaining admissions for `key` in the current window. Does not record anything.
    pub fn remaining(&self, key: &str) -> u64 {
        let now = self.clock.now();
        let active = self
            .records
            .get(key)
            .map(|events| {
                events
                    .iter()
                    .filter(|&&t| now.saturating_duration_since(t) < self.time_window)
                    .count() as u64
            })
            .unwrap_or(0);
        self.max_requests.saturating_sub(active)
    }

    /// Removes keys with no events left in the window. Returns how many were dropped.
    pub fn prune_idle(&self) -> usize {
        let now = self.clock.now();
        let window = self.time_window;
        let mut removed = 0usize;
        self.records.retain(|_, events| {
            prune(events, now, window);
            if events.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            tracing::info!(removed, "pruned idle rate limit keys");
        }
        removed
    }

    /// Number of keys with stored history.
    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// The configured max requests per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn time_window(&self) -> Duration {
        self.time_window
    }

    /// Runs `operation` unless `key` is throttled.
    ///
    /// A rejection surfaces as `RateLimitExceeded` converted into the caller's
    /// error type; errors from `operation` pass through untouched.
    pub async fn with_rate_limit<F, Fut, T, E>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RateLimitExceeded>,
    {
        if self.is_rate_limited(key) {
            return Err(RateLimitExceeded::new(key).into());
        }
        operation().await
    }

    /// Wraps `f` so every call is checked against `key` first.
    pub fn throttle<F>(self: &Arc<Self>, f: F, key: impl Into<String>) -> Throttled<F> {
        Throttled {
            limiter: Arc::clone(self),
            key: key.into(),
            f,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// An async function guarded by a [`RateLimiter`] under a fixed key.
pub struct Throttled<F> {
    limiter: Arc<RateLimiter>,
    key: String,
    f: F,
}

impl<F> Throttled<F> {
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RateLimitExceeded>,
    {
        self.limiter
            .with_rate_limit(&self.key, || (self.f)(args))
            .await
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}
