//! Tiered error classification, response-strategy selection, and recovery
//! monitoring for FTSO market-data sources (spec §4.5).
//!
//! Error classification and severity escalation themselves live in
//! [`ftso_market_core::ClassifiedError`]; this crate adds the strategy
//! selection rule, per-source bounded history, and the wiring that executes
//! a chosen strategy against the circuit breaker, retry, and failover
//! components.

mod error;
mod events;
mod handler;
mod probe;
mod strategy;

pub use error::ErrorHandlerError;
pub use events::ErrorHandlerEvent;
pub use handler::TieredErrorHandler;
pub use probe::HealthProbe;
pub use strategy::{select_strategy, DegradationLevel, ResponseStrategy, StrategyContext};
