//! Retry tuning, with presets for the call classes spec §4.4 names.

use crate::backoff::{ExponentialBackoff, IntervalFunction};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RetryConfig {
    pub name: String,
    pub max_attempts: usize,
    pub backoff: Arc<dyn IntervalFunction>,
}

impl RetryConfig {
    pub fn new(name: impl Into<String>, max_attempts: usize, backoff: Arc<dyn IntervalFunction>) -> Self {
        Self {
            name: name.into(),
            max_attempts,
            backoff,
        }
    }

    /// Preset for HTTP calls to REST fallbacks: 3 attempts, 100ms initial
    /// backoff doubling up to 2s, full jitter.
    pub fn http(name: impl Into<String>) -> Self {
        Self::new(
            name,
            3,
            Arc::new(
                ExponentialBackoff::new(Duration::from_millis(100))
                    .max_interval(Duration::from_secs(2))
                    .jitter(0.2),
            ),
        )
    }

    /// Preset for database-backed lookups: fewer attempts, shorter backoff,
    /// since a local store should fail fast rather than pile up retries.
    pub fn database(name: impl Into<String>) -> Self {
        Self::new(
            name,
            2,
            Arc::new(ExponentialBackoff::new(Duration::from_millis(20)).max_interval(Duration::from_millis(200))),
        )
    }

    /// Preset for in-memory cache operations: a couple of quick attempts
    /// only, since a cache miss is not recoverable by retrying.
    pub fn cache(name: impl Into<String>) -> Self {
        Self::new(
            name,
            2,
            Arc::new(ExponentialBackoff::new(Duration::from_millis(5)).max_interval(Duration::from_millis(50))),
        )
    }

    /// Preset for third-party/exchange external API calls: the most
    /// generous retry budget and jitter, since these sources see the most
    /// transient network and rate-limit noise.
    pub fn external_api(name: impl Into<String>) -> Self {
        Self::new(
            name,
            5,
            Arc::new(
                ExponentialBackoff::new(Duration::from_millis(200))
                    .max_interval(Duration::from_secs(10))
                    .jitter(0.3),
            ),
        )
    }
}
