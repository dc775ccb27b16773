//! In-memory TTL cache backed by `DashMap` for concurrent access.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::error::GuardError;

/// A single cached value with its insertion time.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because they were stale, lazily or by `purge_expired`.
    pub expired: u64,
}

/// Thread-safe in-memory cache with time-to-live expiration.
///
/// Expired entries are lazily evicted on the next `get` for that key. There is
/// no background sweeper and no capacity bound; `purge_expired` is available
/// for callers that want to reclaim memory explicitly.
pub struct TtlCache<T> {
    store: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    counters: CacheCounters,
}

impl<T: Clone> TtlCache<T> {
    /// Creates a new cache with the given time-to-live for entries.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
            clock,
            counters: CacheCounters::default(),
        }
    }

    /// Returns the cached value for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let Some(entry) = self.store.get(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, "cache miss");
            return None;
        };

        if entry.is_stale(now, self.ttl) {
            drop(entry);
            // Only remove if still stale: a concurrent `set` may have refreshed it.
            if self
                .store
                .remove_if(key, |_, e| e.is_stale(now, self.ttl))
                .is_some()
            {
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
            }
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, "cache entry expired");
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "cache hit");
        Some(entry.value.clone())
    }

    /// Inserts or overwrites a cache entry. The entry expires after the configured TTL.
    pub fn set(&self, key: impl Into<String>, value: T) {
        let inserted_at = self.clock.now();
        self.store
            .insert(key.into(), CacheEntry { value, inserted_at });
    }

    /// Removes the entry for `key`, if any.
    pub fn delete(&self, key: &str) {
        self.store.remove(key);
    }

    /// Removes all entries from the cache.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Drops every stale entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut removed = 0usize;
        self.store.retain(|_, entry| {
            if entry.is_stale(now, ttl) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            self.counters
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::info!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Number of physically stored entries, including stale ones not yet read.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
        }
    }
}

impl TtlCache<String> {
    /// Reads a JSON-serialized value. A missing or stale key is `Ok(None)`.
    pub fn get_json<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, GuardError> {
        match self.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serializes `value` to JSON and stores it under `key`.
    pub fn set_json<V: Serialize>(
        &self,
        key: impl Into<String>,
        value: &V,
    ) -> Result<(), GuardError> {
        let json = serde_json::to_string(value)?;
        self.set(key, json);
        Ok(())
    }
}
