//! Error types for the library layer.

use thiserror::Error;

/// Raised when a throttled call is rejected by the rate limiter.
///
/// Callers that wrap their own operations only need `E: From<RateLimitExceeded>`
/// so upstream errors keep their original type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rate limit exceeded for `{key}`, try again later")]
pub struct RateLimitExceeded {
    pub key: String,
}

impl RateLimitExceeded {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Errors produced by the library layer.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A throttled call was rejected.
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    /// JSON serialization or deserialization of a cached value failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure reported by a wrapped upstream operation.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl GuardError {
    /// True when the error means "try again later" rather than a real failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
