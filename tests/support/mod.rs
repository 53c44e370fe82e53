//! Shared test double for integration/property tests: a configurable
//! exchange adapter that never touches a network, used to drive the full
//! `MarketDataService` stack end to end.

use async_trait::async_trait;
use ftso_market_orchestrator::{
    AdapterCapabilities, AdapterError, ConnectionChangeCallback, ExchangeAdapter, PriceTick,
    PriceUpdateCallback,
};
use ftso_market_core::FeedCategory;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub struct TestAdapter {
    pub name: String,
    pub price: f64,
    pub confidence: f64,
    pub volume: Option<f64>,
    pub rest: bool,
    pub fail_first_n: usize,
    attempts: AtomicUsize,
    connected: AtomicBool,
}

impl TestAdapter {
    pub fn new(name: &str, price: f64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            price,
            confidence: 1.0,
            volume: Some(1.0),
            rest: true,
            fail_first_n: 0,
            attempts: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
        })
    }

    pub fn with_confidence(name: &str, price: f64, confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            price,
            confidence,
            volume: Some(1.0),
            rest: true,
            fail_first_n: 0,
            attempts: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
        })
    }

    pub fn always_fails(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            price: 0.0,
            confidence: 0.0,
            volume: None,
            rest: true,
            fail_first_n: usize::MAX,
            attempts: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ExchangeAdapter for TestAdapter {
    fn exchange_name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> FeedCategory {
        FeedCategory::Crypto
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            websocket: false,
            rest: self.rest,
            volume: self.volume.is_some(),
            orderbook: false,
        }
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
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
        if !self.rest {
            return Err(AdapterError::Unsupported);
        }
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.fail_first_n {
            return Err(AdapterError::ConnectionFailed("simulated outage".into()));
        }
        Ok(PriceTick {
            symbol: symbol.to_string(),
            price: self.price,
            timestamp: Instant::now(),
            source: self.name.clone(),
            confidence: self.confidence,
            volume: self.volume,
        })
    }

    fn get_symbol_mapping(&self, feed_symbol: &str) -> String {
        feed_symbol.replace('/', "-")
    }
}
