//! Connection health tracking, data-source registration, and failover
//! orchestration for FTSO market-data sources.

mod error;
mod events;
mod health;
mod recovery;
mod registry;

pub use error::FailoverError;
pub use events::FailoverEvent;
pub use health::{ConnectionState, SourceHealth};
pub use recovery::{ConnectionRecovery, RecoveryAction, RecoveryStrategy, SystemHealth, SystemHealthLabel};
pub use registry::DataSourceRegistry;
