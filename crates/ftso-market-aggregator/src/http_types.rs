//! Request/response contracts for the HTTP surface (spec §6). These are
//! plain structs an axum/tonic handler can build and match against;
//! the HTTP layer itself is an external collaborator (spec §1 Non-goals).

use ftso_market_core::FeedId;
use std::time::Duration;

/// Where a current-value response entry came from (spec §6: `cache`,
/// `aggregated`, `fallback`, `fallback_error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Cache,
    Aggregated,
    /// Served from a live source, but CCXT-backup mode is active for this
    /// feed (spec §4.3's `CcxtBackup` error-handling strategy).
    Fallback,
    /// CCXT-backup mode is active for this feed *and* the current
    /// resolution attempt also failed entirely; the last known good price
    /// is served instead of a hard failure.
    FallbackError,
}

#[derive(Debug, Clone)]
pub struct CurrentValuesRequest {
    pub feeds: Vec<FeedId>,
}

#[derive(Debug, Clone)]
pub struct FeedValue {
    pub feed: FeedId,
    pub value: f64,
    pub timestamp_millis: u64,
    pub confidence: f64,
    pub source: ValueSource,
}

/// Per-feed failure reported alongside a partial-success response
/// (spec §7: "partial success is preferred over total failure").
#[derive(Debug, Clone)]
pub struct FeedFailure {
    pub feed: FeedId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CurrentValuesResponse {
    pub values: Vec<FeedValue>,
    pub failures: Vec<FeedFailure>,
}

impl CurrentValuesResponse {
    /// Spec §7: if `k = 0` of `N` requested feeds succeeded, the response
    /// is a service-unavailable error with per-feed diagnostics rather
    /// than a success envelope with an empty `values` list.
    pub fn is_service_unavailable(&self) -> bool {
        self.values.is_empty() && !self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HistoricalRequest {
    pub voting_round_id: u64,
    pub feeds: Vec<FeedId>,
}

#[derive(Debug, Clone)]
pub struct HistoricalResponse {
    pub voting_round_id: u64,
    pub data: Vec<FeedValue>,
    pub failures: Vec<FeedFailure>,
}

#[derive(Debug, Clone)]
pub struct VolumesRequest {
    pub feeds: Vec<FeedId>,
    pub window: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ExchangeVolume {
    pub exchange: String,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct FeedVolumes {
    pub feed: FeedId,
    pub volumes: Vec<ExchangeVolume>,
}

#[derive(Debug, Clone)]
pub struct VolumesResponse {
    pub feeds: Vec<FeedVolumes>,
}

/// Read-only aggregation across every component's counters (spec §6
/// "Metrics / health").
#[derive(Debug, Clone)]
pub struct MetricsResponse {
    pub cache: ftso_market_cache::CacheStats,
    pub warmup: ftso_market_warmer::WarmupStats,
    pub retry: ftso_market_retry::RetryStats,
    pub system_health: ftso_market_failover::SystemHealth,
}
