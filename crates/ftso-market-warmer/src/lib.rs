//! Predictive cache warming: tracks which feeds are actively read and
//! refreshes them ahead of cache expiry using bounded concurrency so a
//! warming cycle can never flood the underlying data sources.

mod access_pattern;
mod config;
mod error;
mod warmer;

pub use config::{StrategyTuning, WarmerConfig, WarmerConfigBuilder, WarmingStrategyConfig};
pub use error::WarmerError;
pub use warmer::{CacheWarmer, WarmSource, WarmupStats};
