//! Events published on a circuit's `EventBus`.

use crate::circuit::CircuitState;
use ftso_market_core::MarketEvent;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    StateTransition {
        service_id: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    CallPermitted {
        service_id: String,
        timestamp: Instant,
    },
    CallRejected {
        service_id: String,
        timestamp: Instant,
    },
    FailureRecorded {
        service_id: String,
        timestamp: Instant,
        consecutive_failures: usize,
    },
    SuccessRecorded {
        service_id: String,
        timestamp: Instant,
    },
}

impl MarketEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "circuit_state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "circuit_call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "circuit_call_rejected",
            CircuitBreakerEvent::FailureRecorded { .. } => "circuit_failure_recorded",
            CircuitBreakerEvent::SuccessRecorded { .. } => "circuit_success_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. } => *timestamp,
        }
    }
}
