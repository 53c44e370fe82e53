//! Circuit breaker error type.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerError {
    #[error("circuit is open, calls are rejected")]
    Open,
}
