//! Events published on the cache's `EventBus` for the stats sweep and,
//! when the `metrics` feature is on, for counters.

use ftso_market_core::MarketEvent;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum CacheEvent {
    Hit { key: String, timestamp: Instant },
    Miss { key: String, timestamp: Instant },
    Eviction { key: String, timestamp: Instant },
    Expired { key: String, timestamp: Instant },
}

impl MarketEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "cache_hit",
            CacheEvent::Miss { .. } => "cache_miss",
            CacheEvent::Eviction { .. } => "cache_eviction",
            CacheEvent::Expired { .. } => "cache_expired",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Eviction { timestamp, .. }
            | CacheEvent::Expired { timestamp, .. } => *timestamp,
        }
    }
}
