//! Builds the feed-to-exchange mapping from the configuration surface
//! (spec §6, §4.7 phase 1): for each configured feed, a list of
//! `{exchange, symbol}` tuples, plus the per-exchange union of required
//! symbols used in phase 2/4.

use ftso_market_core::FeedId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedSourceSpec {
    pub exchange: String,
    pub symbol: String,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedConfigEntry {
    pub feed: FeedId,
    pub sources: Vec<FeedSourceSpec>,
}

/// Built once at startup from the feed configuration input; duplicate
/// `(exchange, symbol)` entries across feeds coalesce into a single
/// required-symbol entry.
pub struct ExchangeMapping {
    feed_sources: HashMap<FeedId, Vec<FeedSourceSpec>>,
    required_symbols: HashMap<String, HashSet<String>>,
}

impl ExchangeMapping {
    pub fn build(entries: &[FeedConfigEntry]) -> Self {
        let mut feed_sources = HashMap::new();
        let mut required_symbols: HashMap<String, HashSet<String>> = HashMap::new();

        for entry in entries {
            for source in &entry.sources {
                required_symbols
                    .entry(source.exchange.clone())
                    .or_default()
                    .insert(source.symbol.clone());
            }
            feed_sources.insert(entry.feed.clone(), entry.sources.clone());
        }

        Self {
            feed_sources,
            required_symbols,
        }
    }

    pub fn exchanges(&self) -> Vec<String> {
        self.required_symbols.keys().cloned().collect()
    }

    pub fn required_symbols_for(&self, exchange: &str) -> Vec<String> {
        self.required_symbols
            .get(exchange)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sources_for_feed(&self, feed: &FeedId) -> Vec<FeedSourceSpec> {
        self.feed_sources.get(feed).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftso_market_core::FeedCategory;

    #[test]
    fn duplicate_exchange_symbol_pairs_coalesce() {
        let entries = vec![
            FeedConfigEntry {
                feed: FeedId::new(FeedCategory::Crypto, "BTC/USD"),
                sources: vec![FeedSourceSpec {
                    exchange: "binance".into(),
                    symbol: "BTC/USDT".into(),
                }],
            },
            FeedConfigEntry {
                feed: FeedId::new(FeedCategory::Crypto, "ETH/USD"),
                sources: vec![
                    FeedSourceSpec {
                        exchange: "binance".into(),
                        symbol: "BTC/USDT".into(),
                    },
                    FeedSourceSpec {
                        exchange: "binance".into(),
                        symbol: "ETH/USDT".into(),
                    },
                ],
            },
        ];

        let mapping = ExchangeMapping::build(&entries);
        let mut symbols = mapping.required_symbols_for("binance");
        symbols.sort();
        assert_eq!(symbols, vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()]);
    }

    #[test]
    fn unknown_exchange_has_no_required_symbols() {
        let mapping = ExchangeMapping::build(&[]);
        assert!(mapping.required_symbols_for("binance").is_empty());
    }
}
