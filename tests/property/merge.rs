//! Property tests for the aggregation facade's cross-source price merge.
//!
//! Invariant tested: the confidence-weighted merge is a convex combination
//! of the sources that answered, so the merged price can never fall outside
//! the range spanned by those sources' own quotes (SPEC_FULL.md §2, §7).

use super::support::TestAdapter;
use ftso_market_aggregator::{CurrentValuesRequest, MarketDataConfig, MarketDataServiceBuilder};
use ftso_market_core::{FeedCategory, FeedId};
use ftso_market_orchestrator::{FeedConfigEntry, FeedSourceSpec};
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn feed() -> FeedId {
    FeedId::new(FeedCategory::Crypto, "BTC/USD")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Property: merging any combination of source prices and confidences
    /// never produces a result outside the spanned [min, max] of the inputs.
    #[test]
    fn merged_price_never_leaves_the_source_range(
        prices in prop::collection::vec(1.0f64..100_000.0, 2..5),
        confidences in prop::collection::vec(0.0f64..1.0, 2..5),
    ) {
        let n = prices.len().min(confidences.len());
        let prices = &prices[..n];
        let confidences = &confidences[..n];

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let mut builder_adapters = Vec::new();
            let mut sources = Vec::new();
            for (i, (&price, &confidence)) in prices.iter().zip(confidences.iter()).enumerate() {
                let name = format!("exchange-{i}");
                builder_adapters.push(TestAdapter::with_confidence(&name, price, confidence));
                sources.push(FeedSourceSpec {
                    exchange: name,
                    symbol: "BTC/USDT".into(),
                });
            }

            let config = MarketDataConfig {
                feeds: vec![FeedConfigEntry {
                    feed: feed(),
                    sources,
                }],
                ..MarketDataConfig::default()
            };

            let mut builder = MarketDataServiceBuilder::new(config);
            for adapter in builder_adapters {
                builder = builder.adapter(adapter);
            }
            let service = builder.build();
            service.initialize().await;

            let response = service
                .get_current_values(CurrentValuesRequest { feeds: vec![feed()] })
                .await;
            prop_assert!(response.failures.is_empty());

            let merged = response.values[0].value;
            let min_price = prices.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_price = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(merged >= min_price - 1e-6 && merged <= max_price + 1e-6);
            Ok(())
        })?;
    }
}
