//! Events published on the tiered error handler's `EventBus`.

use crate::strategy::ResponseStrategy;
use ftso_market_core::MarketEvent;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum ErrorHandlerEvent {
    StrategySelected {
        source_id: String,
        strategy: ResponseStrategy,
        timestamp: Instant,
    },
    RetrySuccessful {
        source_id: String,
        timestamp: Instant,
    },
    RetryFailed {
        source_id: String,
        timestamp: Instant,
    },
    SourceRecovered {
        source_id: String,
        timestamp: Instant,
    },
}

impl MarketEvent for ErrorHandlerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ErrorHandlerEvent::StrategySelected { .. } => "strategy_selected",
            ErrorHandlerEvent::RetrySuccessful { .. } => "retry_successful",
            ErrorHandlerEvent::RetryFailed { .. } => "retry_failed",
            ErrorHandlerEvent::SourceRecovered { .. } => "source_recovered",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ErrorHandlerEvent::StrategySelected { timestamp, .. }
            | ErrorHandlerEvent::RetrySuccessful { timestamp, .. }
            | ErrorHandlerEvent::RetryFailed { timestamp, .. }
            | ErrorHandlerEvent::SourceRecovered { timestamp, .. } => *timestamp,
        }
    }
}
