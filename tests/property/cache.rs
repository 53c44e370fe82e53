//! Property tests for the real-time cache's TTL clamping.
//!
//! Invariant tested: the effective TTL for any insertion is
//! `min(requestedTTL, maxTTL)` (SPEC_FULL.md §4.1), regardless of how far
//! the requested TTL overshoots the configured maximum.

use ftso_market_cache::{CacheConfig, MarketDataEntry, RealtimeCache};
use ftso_market_core::{FeedCategory, FeedId};
use proptest::prelude::*;
use std::time::Duration;
use tokio::runtime::Runtime;

fn feed() -> FeedId {
    FeedId::new(FeedCategory::Crypto, "BTC/USD")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Property: an entry outlives `max_ttl` only if `requested_ttl` was
    /// also at or below `max_ttl`; an oversized request is clamped down,
    /// never up.
    #[test]
    fn requested_ttl_never_exceeds_max_ttl(
        max_ttl_ms in 10u64..40,
        overshoot_ms in 0u64..200,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let config = CacheConfig {
                max_ttl: Duration::from_millis(max_ttl_ms),
                ..CacheConfig::default()
            };
            let cache = RealtimeCache::new(config);
            let requested = Duration::from_millis(max_ttl_ms) + Duration::from_millis(overshoot_ms);
            cache.set(&feed(), MarketDataEntry::new(1.0, vec!["x".into()], 1.0), requested);

            // Immediately after insertion the entry is always present.
            prop_assert!(cache.get(&feed()).is_some());

            // Once max_ttl has definitely elapsed, the entry must be gone even
            // though the requested TTL (by construction) hasn't.
            tokio::time::sleep(Duration::from_millis(max_ttl_ms) + Duration::from_millis(30)).await;
            prop_assert!(cache.get(&feed()).is_none());
            Ok(())
        })?;
    }

    /// Property: a request at or under `max_ttl` is honored as-is and does
    /// not get silently shortened.
    #[test]
    fn requested_ttl_under_max_is_not_shortened(
        max_ttl_ms in 60u64..150,
        requested_ms in 5u64..50,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let config = CacheConfig {
                max_ttl: Duration::from_millis(max_ttl_ms),
                ..CacheConfig::default()
            };
            let cache = RealtimeCache::new(config);
            cache.set(
                &feed(),
                MarketDataEntry::new(1.0, vec!["x".into()], 1.0),
                Duration::from_millis(requested_ms),
            );

            // Still present well before the shorter of the two TTLs elapses.
            prop_assert!(cache.get(&feed()).is_some());
            Ok(())
        })?;
    }
}
