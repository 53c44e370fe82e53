//! Error types for exchange adapters and the orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("operation not supported by this adapter")]
    Unsupported,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no adapter registered for exchange {0}")]
    UnknownExchange(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
