//! Real-time cache for FTSO market-data feeds.
//!
//! Backs both the "current value" keyspace (what a feed is worth right
//! now) and a per-voting-round keyspace (what a feed was worth when the
//! oracle last voted on it), with TTL expiry swept on a background
//! interval and a pluggable eviction policy for capacity pressure.

mod cache;
mod config;
mod entry;
mod eviction;
mod events;
mod stats;
mod store;

pub use cache::RealtimeCache;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::MarketDataEntry;
pub use events::CacheEvent;
pub use eviction::EvictionPolicy;
pub use stats::CacheStats;
