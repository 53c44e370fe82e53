//! Error type surfaced by the tiered error handler itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ErrorHandlerError {
    #[error("no response strategy could be executed for source {source_id}")]
    NoStrategyAvailable { source_id: String },
    #[error(transparent)]
    Failover(#[from] ftso_market_failover::FailoverError),
}
