//! Retry executor error type.

use ftso_market_circuitbreaker::CircuitBreakerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("operation failed after {attempts} attempt(s): {source}")]
    ExhaustedAttempts { attempts: usize, source: E },
    #[error("circuit open for service, retry aborted")]
    CircuitOpen(#[from] CircuitBreakerError),
    #[error("operation timed out on every one of {attempts} attempt(s)")]
    TimedOut { attempts: usize },
    #[error("service shutdown aborted pending retries")]
    ShuttingDown,
}
