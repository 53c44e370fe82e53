//! Failover error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("no healthy source available for feed {feed}")]
    NoHealthySource { feed: String },
    #[error("source {0} is not registered")]
    UnknownSource(String),
}
