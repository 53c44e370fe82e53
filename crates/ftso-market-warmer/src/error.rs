//! Warmer error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarmerError {
    #[error("warm source failed for feed {feed}: {message}")]
    SourceFailed { feed: String, message: String },
    #[error("warm cycle timed out after {0:?}")]
    Timeout(std::time::Duration),
}
