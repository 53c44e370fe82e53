//! Assembles every sub-config enumerated in spec §6 into one
//! `serde`-deserializable tree, following the teacher's
//! `*ConfigBuilder` idiom for programmatic construction.

use ftso_market_cache::CacheConfig;
use ftso_market_circuitbreaker::CircuitBreakerConfig;
use ftso_market_orchestrator::FeedConfigEntry;
use ftso_market_warmer::WarmerConfig;
use std::time::Duration;

/// Numeric retry knobs (spec §6): kept separate from
/// [`ftso_market_retry::RetryConfig`] because that type holds a boxed
/// backoff function and isn't `serde`-representable; these knobs are
/// converted into concrete `RetryConfig` presets at service construction.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryKnobs {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryKnobs {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

/// Tier-failover timing budgets (spec §4.5, §6).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FailoverBudgets {
    pub tier1_to_tier2_delay_ms: u64,
    pub ccxt_backup_budget_ms: u64,
    pub failover_budget_ms: u64,
}

impl Default for FailoverBudgets {
    fn default() -> Self {
        Self {
            tier1_to_tier2_delay_ms: 50,
            ccxt_backup_budget_ms: 100,
            failover_budget_ms: 100,
        }
    }
}

/// Top-level configuration tree for the whole market-data service.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarketDataConfig {
    pub cache: CacheConfig,
    pub warmer: WarmerConfig,
    pub adapter_circuit: CircuitBreakerConfig,
    pub exchange_circuit: CircuitBreakerConfig,
    pub retry: RetryKnobs,
    pub failover: FailoverBudgets,
    pub feeds: Vec<FeedConfigEntry>,
    /// Volume-query default window (spec §6: `windowSec` defaults to 60).
    pub default_volume_window: Duration,
    /// Voting-round historical entries get a 60s TTL regardless of the
    /// cache's general `maxTTL` (spec §6 "Historical").
    pub historical_ttl: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            warmer: WarmerConfig::default(),
            adapter_circuit: CircuitBreakerConfig::adapter("adapter-default"),
            exchange_circuit: CircuitBreakerConfig::exchange_source("exchange-default"),
            retry: RetryKnobs::default(),
            failover: FailoverBudgets::default(),
            feeds: Vec::new(),
            default_volume_window: Duration::from_secs(60),
            historical_ttl: Duration::from_secs(60),
        }
    }
}

/// Fluent builder mirroring the per-crate `*ConfigBuilder` idiom.
pub struct MarketDataConfigBuilder {
    config: MarketDataConfig,
}

impl MarketDataConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MarketDataConfig::default(),
        }
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn warmer(mut self, warmer: WarmerConfig) -> Self {
        self.config.warmer = warmer;
        self
    }

    pub fn retry(mut self, retry: RetryKnobs) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn feeds(mut self, feeds: Vec<FeedConfigEntry>) -> Self {
        self.config.feeds = feeds;
        self
    }

    pub fn default_volume_window(mut self, window: Duration) -> Self {
        self.config.default_volume_window = window;
        self
    }

    pub fn build(self) -> MarketDataConfig {
        self.config
    }
}

impl Default for MarketDataConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
