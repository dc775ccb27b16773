//! Runtime configuration for the cache and rate limiter.
//!
//! Values come from an optional TOML file and are then overridden by
//! `LECTERN_*` environment variables. Unparseable overrides are ignored.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::error::GuardError;
use crate::rate_limiter::RateLimiter;

pub const ENV_CACHE_TTL_MS: &str = "LECTERN_CACHE_TTL_MS";
pub const ENV_RATE_LIMIT_MAX: &str = "LECTERN_RATE_LIMIT_MAX";
pub const ENV_RATE_LIMIT_WINDOW_MS: &str = "LECTERN_RATE_LIMIT_WINDOW_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Maximum cache entry age in milliseconds.
    pub cache_ttl_ms: u64,
    /// Admitted events per key per window.
    pub rate_limit_max_requests: u64,
    /// Sliding window length in milliseconds.
    pub rate_limit_window_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 300_000,
            rate_limit_max_requests: 60,
            rate_limit_window_ms: 60_000,
        }
    }
}

impl GuardConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, GuardError> {
        toml::from_str(raw).map_err(|e| GuardError::Config(e.to_string()))
    }

    /// Loads `path` if given (defaults otherwise), then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, GuardError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env();
        tracing::debug!(?config, "loaded guard config");
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parse = |key: &str| lookup(key).and_then(|val| val.trim().parse::<u64>().ok());
        if let Some(v) = parse(ENV_CACHE_TTL_MS) {
            self.cache_ttl_ms = v;
        }
        if let Some(v) = parse(ENV_RATE_LIMIT_MAX) {
            self.rate_limit_max_requests = v;
        }
        if let Some(v) = parse(ENV_RATE_LIMIT_WINDOW_MS) {
            self.rate_limit_window_ms = v;
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn build_cache<T: Clone>(&self) -> TtlCache<T> {
        TtlCache::new(self.cache_ttl())
    }

    pub fn build_rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit_max_requests, self.rate_limit_window())
    }
}
