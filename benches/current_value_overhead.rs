use criterion::{Criterion, criterion_group, criterion_main};
use ftso_market_aggregator::{CurrentValuesRequest, MarketDataConfig, MarketDataServiceBuilder};
use ftso_market_core::{FeedCategory, FeedId};
use ftso_market_orchestrator::{
    AdapterCapabilities, AdapterError, ConnectionChangeCallback, ExchangeAdapter, PriceTick,
    PriceUpdateCallback,
};
use ftso_market_orchestrator::{FeedConfigEntry, FeedSourceSpec};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

/// A zero-latency exchange adapter: every bench iteration measures the
/// facade's own overhead, not simulated network time.
struct BenchAdapter;

#[async_trait::async_trait]
impl ExchangeAdapter for BenchAdapter {
    fn exchange_name(&self) -> &str {
        "bench-exchange"
    }

    fn category(&self) -> FeedCategory {
        FeedCategory::Crypto
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            websocket: false,
            rest: true,
            volume: true,
            orderbook: false,
        }
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn subscribe(&self, _symbols: &[String]) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn unsubscribe(&self, _symbols: &[String]) -> Result<(), AdapterError> {
        Ok(())
    }

    fn on_price_update(&self, _callback: PriceUpdateCallback) {}
    fn on_connection_change(&self, _callback: ConnectionChangeCallback) {}

    async fn fetch_ticker_rest(&self, symbol: &str) -> Result<PriceTick, AdapterError> {
        // Jitter the quote so a cache-miss bench run never merges an
        // artificially identical value across iterations.
        let jitter: f64 = rand::random::<f64>() * 10.0;
        Ok(PriceTick {
            symbol: symbol.to_string(),
            price: 50_000.0 + jitter,
            timestamp: Instant::now(),
            source: "bench-exchange".to_string(),
            confidence: 1.0,
            volume: Some(1.0),
        })
    }

    fn get_symbol_mapping(&self, feed_symbol: &str) -> String {
        feed_symbol.replace('/', "-")
    }
}

fn btc() -> FeedId {
    FeedId::new(FeedCategory::Crypto, "BTC/USD")
}

fn config() -> MarketDataConfig {
    MarketDataConfig {
        feeds: vec![FeedConfigEntry {
            feed: btc(),
            sources: vec![FeedSourceSpec {
                exchange: "bench-exchange".into(),
                symbol: "BTC/USDT".into(),
            }],
        }],
        ..MarketDataConfig::default()
    }
}

fn bench_cache_miss(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("current_value_cache_miss", |b| {
        b.to_async(&runtime).iter(|| async {
            // A fresh service per iteration keeps every call a miss.
            let service = MarketDataServiceBuilder::new(config())
                .adapter(Arc::new(BenchAdapter))
                .build();
            service.initialize().await;
            let response = service
                .get_current_values(CurrentValuesRequest {
                    feeds: vec![black_box(btc())],
                })
                .await;
            black_box(response)
        });
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let service = runtime.block_on(async {
        let service = MarketDataServiceBuilder::new(config())
            .adapter(Arc::new(BenchAdapter))
            .build();
        service.initialize().await;
        service
            .get_current_values(CurrentValuesRequest { feeds: vec![btc()] })
            .await;
        service
    });

    c.bench_function("current_value_cache_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            let response = service
                .get_current_values(CurrentValuesRequest {
                    feeds: vec![black_box(btc())],
                })
                .await;
            black_box(response)
        });
    });
}

criterion_group!(benches, bench_cache_miss, bench_cache_hit);
criterion_main!(benches);
