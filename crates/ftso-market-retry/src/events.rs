//! Events published on the retry executor's `EventBus`.

use ftso_market_core::MarketEvent;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum RetryEvent {
    AttemptFailed {
        service_id: String,
        attempt: usize,
        timestamp: Instant,
    },
    RetryScheduled {
        service_id: String,
        attempt: usize,
        delay: Duration,
        timestamp: Instant,
    },
    AttemptsExhausted {
        service_id: String,
        attempts: usize,
        timestamp: Instant,
    },
    Succeeded {
        service_id: String,
        attempt: usize,
        timestamp: Instant,
    },
}

impl MarketEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::AttemptFailed { .. } => "retry_attempt_failed",
            RetryEvent::RetryScheduled { .. } => "retry_scheduled",
            RetryEvent::AttemptsExhausted { .. } => "retry_attempts_exhausted",
            RetryEvent::Succeeded { .. } => "retry_succeeded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::AttemptFailed { timestamp, .. }
            | RetryEvent::RetryScheduled { timestamp, .. }
            | RetryEvent::AttemptsExhausted { timestamp, .. }
            | RetryEvent::Succeeded { timestamp, .. } => *timestamp,
        }
    }
}
