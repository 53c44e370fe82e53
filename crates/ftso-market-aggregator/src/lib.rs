//! Top-level wiring for the FTSO market-data service: assembles the cache,
//! warmer, circuit breaker, retry, failover, error handler, and orchestrator
//! crates behind one facade an HTTP/RPC layer can call into (spec §2).

mod config;
mod facade;
mod http_types;

pub use config::{FailoverBudgets, MarketDataConfig, MarketDataConfigBuilder, RetryKnobs};
pub use facade::{MarketDataService, MarketDataServiceBuilder};
pub use http_types::{
    CurrentValuesRequest, CurrentValuesResponse, ExchangeVolume, FeedFailure, FeedValue,
    FeedVolumes, HistoricalRequest, HistoricalResponse, MetricsResponse, ValueSource,
    VolumesRequest, VolumesResponse,
};
