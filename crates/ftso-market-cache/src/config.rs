//! Cache configuration and its builder.

use crate::eviction::EvictionPolicy;
use std::time::Duration;

/// Tuning for one [`crate::RealtimeCache`] instance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    pub max_ttl: Duration,
    pub max_entries: usize,
    pub eviction_policy: EvictionPolicy,
    /// Advisory soft cap on estimated memory usage (spec §3 "Cache
    /// configuration": `memoryLimit` is advisory). Crossing it never
    /// triggers an eviction by itself; it only gates the rate-limited
    /// "cache performance degraded" warning (spec §7).
    pub memory_limit_bytes: Option<usize>,
    /// Interval for the background sweep that drops expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_ttl: Duration::from_millis(1000),
            max_entries: 10_000,
            eviction_policy: EvictionPolicy::Lru,
            memory_limit_bytes: None,
            sweep_interval: Duration::from_millis(500),
        }
    }
}

/// Builder for [`CacheConfig`], mirroring the defaults above.
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    /// Default: 1000ms.
    pub fn max_ttl(mut self, ttl: Duration) -> Self {
        self.config.max_ttl = ttl;
        self
    }

    /// Default: 10_000.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.config.max_entries = n;
        self
    }

    /// Default: LRU.
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Default: unset (no memory-based eviction).
    pub fn memory_limit_bytes(mut self, limit: usize) -> Self {
        self.config.memory_limit_bytes = Some(limit);
        self
    }

    /// Default: 500ms.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
