//! Registry of data sources and which sources back which feeds.

use crate::error::FailoverError;
use crate::health::SourceHealth;
use ftso_market_core::{FeedId, SourceTier};
use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks every registered data source's health and the ordered source
/// preference list configured for each feed (Tier 1 adapters first,
/// CCXT-backed Tier 2 sources as fallback).
pub struct DataSourceRegistry {
    sources: Mutex<HashMap<String, SourceHealth>>,
    feed_sources: Mutex<HashMap<FeedId, Vec<String>>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
            feed_sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_data_source(&self, source_id: impl Into<String>, tier: SourceTier) -> SourceHealth {
        let source_id = source_id.into();
        let health = SourceHealth::new(source_id.clone(), tier);
        self.sources.lock().unwrap().insert(source_id, health.clone());
        health
    }

    pub fn unregister_data_source(&self, source_id: &str) {
        self.sources.lock().unwrap().remove(source_id);
        for sources in self.feed_sources.lock().unwrap().values_mut() {
            sources.retain(|s| s != source_id);
        }
    }

    /// Sets the ordered source preference list for a feed. The first
    /// healthy source in the list is preferred; [`crate::recovery::ConnectionRecovery`]
    /// walks this list on failover.
    pub fn configure_feed_sources(&self, feed: FeedId, source_ids: Vec<String>) {
        self.feed_sources.lock().unwrap().insert(feed, source_ids);
    }

    pub fn health(&self, source_id: &str) -> Option<SourceHealth> {
        self.sources.lock().unwrap().get(source_id).cloned()
    }

    pub fn sources_for_feed(&self, feed: &FeedId) -> Vec<String> {
        self.feed_sources
            .lock()
            .unwrap()
            .get(feed)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the first healthy source configured for a feed, preferring
    /// Tier 1 adapters over Tier 2 CCXT-backed sources at equal health.
    pub fn preferred_healthy_source(&self, feed: &FeedId) -> Result<String, FailoverError> {
        let sources = self.sources_for_feed(feed);
        if sources.is_empty() {
            return Err(FailoverError::NoHealthySource {
                feed: feed.to_string(),
            });
        }

        let registry = self.sources.lock().unwrap();
        sources
            .iter()
            .filter_map(|id| registry.get(id).map(|h| (id.clone(), h.clone())))
            .filter(|(_, health)| health.is_healthy())
            .min_by_key(|(_, health)| match health.tier {
                SourceTier::Tier1 => 0,
                SourceTier::Tier2 => 1,
            })
            .map(|(id, _)| id)
            .ok_or_else(|| FailoverError::NoHealthySource {
                feed: feed.to_string(),
            })
    }

    pub fn all_sources(&self) -> Vec<SourceHealth> {
        self.sources.lock().unwrap().values().cloned().collect()
    }
}

impl Default for DataSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftso_market_core::FeedCategory;

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    #[test]
    fn prefers_tier1_over_tier2_when_both_healthy() {
        let registry = DataSourceRegistry::new();
        let tier1 = registry.register_data_source("binance", SourceTier::Tier1);
        let tier2 = registry.register_data_source("ccxt-binance", SourceTier::Tier2);
        tier1.mark_connected();
        tier2.mark_connected();

        registry.configure_feed_sources(feed(), vec!["ccxt-binance".into(), "binance".into()]);
        assert_eq!(registry.preferred_healthy_source(&feed()).unwrap(), "binance");
    }

    #[test]
    fn falls_back_to_tier2_when_tier1_unhealthy() {
        let registry = DataSourceRegistry::new();
        let tier1 = registry.register_data_source("binance", SourceTier::Tier1);
        let tier2 = registry.register_data_source("ccxt-binance", SourceTier::Tier2);
        tier1.mark_disconnected("down");
        tier2.mark_connected();

        registry.configure_feed_sources(feed(), vec!["binance".into(), "ccxt-binance".into()]);
        assert_eq!(registry.preferred_healthy_source(&feed()).unwrap(), "ccxt-binance");
    }

    #[test]
    fn no_healthy_source_is_an_error() {
        let registry = DataSourceRegistry::new();
        registry.register_data_source("binance", SourceTier::Tier1);
        registry.configure_feed_sources(feed(), vec!["binance".into()]);
        assert!(registry.preferred_healthy_source(&feed()).is_err());
    }

    #[test]
    fn unregistering_a_source_drops_it_from_feed_lists() {
        let registry = DataSourceRegistry::new();
        registry.register_data_source("binance", SourceTier::Tier1);
        registry.configure_feed_sources(feed(), vec!["binance".into()]);
        registry.unregister_data_source("binance");
        assert!(registry.sources_for_feed(&feed()).is_empty());
    }
}
