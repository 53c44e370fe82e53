//! Events published on the failover component's `EventBus`.

use ftso_market_core::MarketEvent;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum FailoverEvent {
    FailoverCompleted {
        feed: String,
        from_source: String,
        to_source: String,
        elapsed: Duration,
        timestamp: Instant,
    },
    ConnectionRestored {
        source_id: String,
        timestamp: Instant,
    },
    PartialServiceDegradation {
        affected_feeds: Vec<String>,
        timestamp: Instant,
    },
    CompleteServiceDegradation {
        timestamp: Instant,
    },
}

impl MarketEvent for FailoverEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FailoverEvent::FailoverCompleted { .. } => "failover_completed",
            FailoverEvent::ConnectionRestored { .. } => "connection_restored",
            FailoverEvent::PartialServiceDegradation { .. } => "partial_service_degradation",
            FailoverEvent::CompleteServiceDegradation { .. } => "complete_service_degradation",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FailoverEvent::FailoverCompleted { timestamp, .. }
            | FailoverEvent::ConnectionRestored { timestamp, .. }
            | FailoverEvent::PartialServiceDegradation { timestamp, .. }
            | FailoverEvent::CompleteServiceDegradation { timestamp, .. } => *timestamp,
        }
    }
}
