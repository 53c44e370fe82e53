//! The exchange adapter contract (spec §6, design note "Polymorphism across
//! adapters"): a capability set rather than a base class, implemented once
//! per custom exchange integration and once for the multi-exchange CCXT
//! backend.

use crate::error::AdapterError;
use async_trait::async_trait;
use ftso_market_core::FeedCategory;
use std::sync::Arc;
use std::time::Instant;

/// A normalized inbound price tick, the shape every adapter's push callback
/// delivers regardless of the underlying wire format.
#[derive(Debug, Clone)]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    pub timestamp: Instant,
    pub source: String,
    pub confidence: f64,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterCapabilities {
    pub websocket: bool,
    pub rest: bool,
    pub volume: bool,
    pub orderbook: bool,
}

pub type PriceUpdateCallback = Arc<dyn Fn(PriceTick) + Send + Sync>;
pub type ConnectionChangeCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Identity, lifecycle, and data-push contract every exchange integration
/// implements, whether a hand-written per-exchange client or the
/// CCXT-backed multi-exchange fallback.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn exchange_name(&self) -> &str;
    fn category(&self) -> FeedCategory;
    fn capabilities(&self) -> AdapterCapabilities;

    async fn connect(&self) -> Result<(), AdapterError>;
    async fn disconnect(&self) -> Result<(), AdapterError>;
    fn is_connected(&self) -> bool;

    async fn subscribe(&self, symbols: &[String]) -> Result<(), AdapterError>;
    async fn unsubscribe(&self, symbols: &[String]) -> Result<(), AdapterError>;

    fn on_price_update(&self, callback: PriceUpdateCallback);
    fn on_connection_change(&self, callback: ConnectionChangeCallback);

    /// Pull-mode REST fetch; adapters without REST support return
    /// [`AdapterError::Unsupported`].
    async fn fetch_ticker_rest(&self, _symbol: &str) -> Result<PriceTick, AdapterError> {
        Err(AdapterError::Unsupported)
    }

    /// Lightweight liveness probe; defaults to the cached connection flag.
    async fn health_check(&self) -> Result<bool, AdapterError> {
        Ok(self.is_connected())
    }

    /// Converts a normalized feed symbol (`BTC/USDT`) to this exchange's
    /// wire form (`BTC-USDT`, `BTCUSDT`, ...).
    fn get_symbol_mapping(&self, feed_symbol: &str) -> String;
}
