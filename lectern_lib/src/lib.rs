//! Library layer for Lectern: process-local guards for upstream data calls.
//!
//! Provides an in-memory TTL cache with async memoization and a per-key
//! sliding-window rate limiter, both driven by a pluggable monotonic clock.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod memoize;
pub mod rate_limiter;

pub use cache::{CacheEntry, CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GuardConfig;
pub use error::{GuardError, RateLimitExceeded};
pub use memoize::Memoized;
pub use rate_limiter::{LimiterStats, RateLimiter, Throttled};
