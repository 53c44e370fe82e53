//! Public real-time cache facade.

use crate::config::CacheConfig;
use crate::entry::{CacheItem, MarketDataEntry};
use crate::events::CacheEvent;
use crate::stats::{CacheStats, StatsCounters};
use crate::store::Store;
use ftso_market_core::{EventBus, FeedId};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// TTL/LRU cache for market-data feeds, keyed by feed identity and,
/// optionally, by voting round.
///
/// Two independent keyspaces share the same store (spec §4.1): the
/// current-price keyspace (`price:{category}:{name}`, written through
/// [`Self::set`]/[`Self::set_price`]) and the voting-round keyspace
/// (`voting:{round}:{category}:{name}`, written through
/// [`Self::set_for_voting_round`]), so a round snapshot survives the live
/// value being overwritten by the next price update.
pub struct RealtimeCache {
    store: Arc<Mutex<Store>>,
    counters: Arc<StatsCounters>,
    events: EventBus<CacheEvent>,
    config: CacheConfig,
    sweeper: Option<JoinHandle<()>>,
    last_memory_warning: Mutex<Option<Instant>>,
}

/// Minimum gap between repeated "cache performance degraded" warnings
/// (spec §7: rate-limited 30s-5min cooldown regime).
const MEMORY_WARNING_COOLDOWN: Duration = Duration::from_secs(30);

impl RealtimeCache {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(Mutex::new(Store::new(
            config.max_entries,
            config.eviction_policy,
            config.memory_limit_bytes,
        )));
        let counters = Arc::new(StatsCounters::default());
        let events = EventBus::new();

        let sweeper = {
            let store = Arc::clone(&store);
            let counters = Arc::clone(&counters);
            let events = events.clone();
            let interval = config.sweep_interval;
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let expired = {
                        let mut store = store.lock().unwrap();
                        store.sweep_expired(&counters)
                    };
                    for key in expired {
                        events.publish(&CacheEvent::Expired {
                            key,
                            timestamp: Instant::now(),
                        });
                    }
                }
            }))
        };

        Self {
            store,
            counters,
            events,
            config,
            sweeper,
            last_memory_warning: Mutex::new(None),
        }
    }

    pub fn event_bus(&self) -> EventBus<CacheEvent> {
        self.events.clone()
    }

    /// Writes the current value for a feed with a caller-supplied TTL,
    /// clamped to `[0, maxTTL]` (spec §4.1). A non-positive effective TTL
    /// is a successful no-op: nothing is inserted, nothing errors.
    pub fn set(&self, feed: &FeedId, entry: MarketDataEntry, requested_ttl: Duration) {
        let effective_ttl = requested_ttl.min(self.config.max_ttl);
        if effective_ttl.is_zero() {
            return;
        }
        self.insert_keyed(price_key(feed), entry, effective_ttl);
    }

    /// Reads the current value for a feed.
    pub fn get(&self, feed: &FeedId) -> Option<MarketDataEntry> {
        self.get_keyed(&price_key(feed))
    }

    /// Drops the current value for a feed.
    pub fn invalidate(&self, feed: &FeedId) {
        let mut store = self.store.lock().unwrap();
        store.remove(&price_key(feed));
    }

    /// Writes a value pinned to a specific voting round, TTL clamped the
    /// same way as [`Self::set`].
    pub fn set_for_voting_round(&self, feed: &FeedId, round: u64, entry: MarketDataEntry, requested_ttl: Duration) {
        let effective_ttl = requested_ttl.min(self.config.max_ttl);
        if effective_ttl.is_zero() {
            return;
        }
        self.insert_keyed(voting_round_key(feed, round), entry.for_voting_round(round), effective_ttl);
    }

    /// Reads the value pinned to a specific voting round, if still cached.
    pub fn get_for_voting_round(&self, feed: &FeedId, round: u64) -> Option<MarketDataEntry> {
        self.get_keyed(&voting_round_key(feed, round))
    }

    /// Writes the current value for a feed at the cache's configured
    /// `maxTTL` (spec §4.1: "writes ... with the configured max TTL, then
    /// invalidates all voting-round keys"), then clears every voting-round
    /// entry for this feed so a stale round snapshot can't outlive the
    /// price it was taken against.
    pub fn set_price(&self, feed: &FeedId, price: f64, sources: Vec<String>, confidence: f64) {
        let max_ttl = self.config.max_ttl;
        self.set(feed, MarketDataEntry::new(price, sources, confidence), max_ttl);
        self.invalidate_on_price_update(feed);
    }

    /// Convenience alias for `get().map(|e| e.price)`.
    pub fn get_price(&self, feed: &FeedId) -> Option<f64> {
        self.get(feed).map(|e| e.price)
    }

    /// Clears every voting-round key for `feed`, leaving the current-price
    /// entry untouched so it can keep expiring naturally (spec §4.1
    /// "Invariants": "invalidating on price update removes only
    /// voting-round keys for that feed").
    pub fn invalidate_on_price_update(&self, feed: &FeedId) {
        let suffix = format!(":{}", feed.encode());
        let mut store = self.store.lock().unwrap();
        store.remove_matching(|key| key.starts_with("voting:") && key.ends_with(&suffix));
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.store.lock().unwrap();
        self.counters
            .snapshot(store.len(), store.estimated_memory_usage())
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.store.lock().unwrap().clear();
    }

    fn insert_keyed(&self, key: String, entry: MarketDataEntry, effective_ttl: Duration) {
        let item = CacheItem::new(entry, effective_ttl);
        let mut store = self.store.lock().unwrap();
        let over_limit = store.is_over_memory_limit();
        if let Some(_evicted) = store.insert(key.clone(), item) {
            self.counters.record_eviction();
            self.events.publish(&CacheEvent::Eviction {
                key,
                timestamp: Instant::now(),
            });
        }
        drop(store);

        if over_limit {
            self.warn_memory_degraded();
        }
    }

    /// Emits the rate-limited "cache performance degraded" warning (spec
    /// §7) when estimated memory usage exceeds the advisory
    /// `memory_limit_bytes`. Crossing the limit never evicts anything by
    /// itself — the limit is advisory, not enforced.
    fn warn_memory_degraded(&self) {
        let mut last_warning = self.last_memory_warning.lock().unwrap();
        let now = Instant::now();
        let should_warn = last_warning
            .map(|t| now.duration_since(t) >= MEMORY_WARNING_COOLDOWN)
            .unwrap_or(true);
        if should_warn {
            *last_warning = Some(now);
            #[cfg(feature = "tracing")]
            tracing::warn!("cache performance degraded: estimated memory usage exceeds advisory limit");
        }
    }

    fn get_keyed(&self, key: &str) -> Option<MarketDataEntry> {
        let start = Instant::now();
        let mut store = self.store.lock().unwrap();
        let found = store.get(key);
        drop(store);

        match found {
            Some(item) => {
                self.counters.record_hit(start.elapsed());
                self.events.publish(&CacheEvent::Hit {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });
                Some(item.entry)
            }
            None => {
                self.counters.record_miss(start.elapsed());
                self.events.publish(&CacheEvent::Miss {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });
                None
            }
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Drop for RealtimeCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

fn price_key(feed: &FeedId) -> String {
    format!("price:{}", feed.encode())
}

fn voting_round_key(feed: &FeedId, round: u64) -> String {
    format!("voting:{}:{}", round, feed.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftso_market_core::FeedCategory;

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = RealtimeCache::new(CacheConfig::default());
        cache.set_price(&feed(), 50_000.0, vec!["binance".into()], 0.95);
        assert_eq!(cache.get_price(&feed()), Some(50_000.0));
    }

    #[tokio::test]
    async fn voting_round_keyspace_is_independent_of_current_value() {
        let cache = RealtimeCache::new(CacheConfig::default());
        cache.set_price(&feed(), 50_000.0, vec!["binance".into()], 0.95);
        cache.set_for_voting_round(
            &feed(),
            42,
            MarketDataEntry::new(49_900.0, vec!["binance".into()], 0.9),
            Duration::from_secs(60),
        );

        assert_eq!(cache.get_price(&feed()), Some(50_000.0));
        assert_eq!(
            cache.get_for_voting_round(&feed(), 42).map(|e| e.price),
            Some(49_900.0)
        );
        assert!(cache.get_for_voting_round(&feed(), 7).is_none());
    }

    #[tokio::test]
    async fn invalidate_on_price_update_clears_voting_round_but_not_price() {
        let cache = RealtimeCache::new(CacheConfig::default());
        cache.set_price(&feed(), 50_000.0, vec!["binance".into()], 0.95);
        cache.set_for_voting_round(
            &feed(),
            123,
            MarketDataEntry::new(50_000.0, vec!["binance".into()], 0.95),
            Duration::from_secs(60),
        );
        cache.invalidate_on_price_update(&feed());

        assert_eq!(cache.get_price(&feed()), Some(50_000.0));
        assert!(cache.get_for_voting_round(&feed(), 123).is_none());
    }

    #[tokio::test]
    async fn set_price_invalidates_existing_voting_round_entries() {
        let cache = RealtimeCache::new(CacheConfig::default());
        cache.set_for_voting_round(
            &feed(),
            1,
            MarketDataEntry::new(1.0, vec![], 1.0),
            Duration::from_secs(60),
        );
        cache.set_price(&feed(), 2.0, vec![], 1.0);

        assert!(cache.get_for_voting_round(&feed(), 1).is_none());
        assert_eq!(cache.get_price(&feed()), Some(2.0));
    }

    #[tokio::test]
    async fn non_positive_ttl_is_a_no_op() {
        let cache = RealtimeCache::new(CacheConfig::default());
        cache.set(&feed(), MarketDataEntry::new(1.0, vec![], 1.0), Duration::ZERO);
        assert!(cache.get(&feed()).is_none());
    }

    #[tokio::test]
    async fn requested_ttl_is_clamped_to_max_ttl() {
        let config = CacheConfig {
            max_ttl: Duration::from_millis(20),
            ..CacheConfig::default()
        };
        let cache = RealtimeCache::new(config);
        cache.set(&feed(), MarketDataEntry::new(1.0, vec![], 1.0), Duration::from_secs(5));
        assert!(cache.get(&feed()).is_some());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&feed()).is_none());
    }

    #[tokio::test]
    async fn stats_reflect_hits_and_misses() {
        let cache = RealtimeCache::new(CacheConfig::default());
        cache.set_price(&feed(), 1.0, vec![], 1.0);
        cache.get_price(&feed());
        cache.get_price(&FeedId::new(FeedCategory::Forex, "EUR/USD"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 2);
    }

    #[tokio::test]
    async fn crossing_the_advisory_memory_limit_does_not_evict_anything() {
        let config = CacheConfig {
            memory_limit_bytes: Some(1),
            ..CacheConfig::default()
        };
        let cache = RealtimeCache::new(config);
        cache.set_price(&feed(), 1.0, vec![], 1.0);
        cache.set_price(&FeedId::new(FeedCategory::Forex, "EUR/USD"), 2.0, vec![], 1.0);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }
}
