//! Shared primitives used across the FTSO market-data aggregator crates:
//! feed identity, the cross-component event bus, and the classified error
//! taxonomy that the circuit breaker, retry executor, failover, and tiered
//! error handler all key their decisions on.

pub mod error;
pub mod events;
pub mod feed;

pub use error::{ClassifiedError, ErrorClassification, ErrorSeverity, SourceTier};
pub use events::{EventBus, MarketEvent};
pub use feed::{FeedCategory, FeedId};
