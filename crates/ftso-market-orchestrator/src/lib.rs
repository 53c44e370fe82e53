//! Owns exchange adapter lifecycles and maps configured feeds to
//! (exchange, symbol) WebSocket subscriptions (spec §4.7).

mod adapter;
mod error;
mod mapping;
mod orchestrator;

pub use adapter::{
    AdapterCapabilities, ConnectionChangeCallback, ExchangeAdapter, PriceTick, PriceUpdateCallback,
};
pub use error::{AdapterError, OrchestratorError};
pub use mapping::{ExchangeMapping, FeedConfigEntry, FeedSourceSpec};
pub use orchestrator::WebSocketOrchestrator;
