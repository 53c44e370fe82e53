//! Single-service circuit state machine.

use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
use crate::events::CircuitBreakerEvent;
use ftso_market_core::EventBus;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    timestamp: Instant,
    is_failure: bool,
}

/// Point-in-time view of a circuit's health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub consecutive_successes: usize,
    pub recorded_calls: usize,
    pub time_since_state_change: std::time::Duration,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    last_request: Option<Instant>,
    consecutive_failures: usize,
    consecutive_successes: usize,
    history: VecDeque<CallRecord>,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            last_state_change: Instant::now(),
            last_request: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            history: VecDeque::new(),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            recorded_calls: self.history.len(),
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Checks whether a call may proceed, opening the half-open probe
    /// window if the circuit has been open long enough.
    pub(crate) fn try_acquire(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &EventBus<CircuitBreakerEvent>,
    ) -> Result<(), CircuitBreakerError> {
        self.last_request = Some(Instant::now());
        match self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.wait_duration_in_open {
                    self.transition_to(CircuitState::HalfOpen, config, events);
                    Ok(())
                } else {
                    events.publish(&CircuitBreakerEvent::CallRejected {
                        service_id: config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    Err(CircuitBreakerError::Open)
                }
            }
            CircuitState::HalfOpen => Ok(()),
        }
    }

    pub(crate) fn record_success(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &EventBus<CircuitBreakerEvent>,
    ) {
        self.push_record(config, false);
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;

        events.publish(&CircuitBreakerEvent::SuccessRecorded {
            service_id: config.name.clone(),
            timestamp: Instant::now(),
        });
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "service" => config.name.clone(), "outcome" => "success").increment(1);

        if self.state == CircuitState::HalfOpen && self.consecutive_successes >= config.success_threshold {
            self.transition_to(CircuitState::Closed, config, events);
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &EventBus<CircuitBreakerEvent>,
    ) {
        self.push_record(config, true);
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;

        events.publish(&CircuitBreakerEvent::FailureRecorded {
            service_id: config.name.clone(),
            timestamp: Instant::now(),
            consecutive_failures: self.consecutive_failures,
        });
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "service" => config.name.clone(), "outcome" => "failure").increment(1);

        match self.state {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open, config, events),
            CircuitState::Closed if self.consecutive_failures >= config.failure_threshold => {
                self.transition_to(CircuitState::Open, config, events)
            }
            _ => {}
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig, events: &EventBus<CircuitBreakerEvent>) {
        self.transition_to(CircuitState::Open, config, events);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig, events: &EventBus<CircuitBreakerEvent>) {
        self.transition_to(CircuitState::Closed, config, events);
    }

    /// Background health sweep (spec §4.3): a half-open circuit with no
    /// request in `idle_half_open` is returned to closed with fresh
    /// counters (a stalled probe should not hold the circuit open-ish
    /// forever), and an open circuit older than `recovery_timeout +
    /// extra_grace` is forced into half-open even without an incoming
    /// request to trigger the lazy transition in [`Self::try_acquire`].
    pub(crate) fn health_sweep(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &EventBus<CircuitBreakerEvent>,
        idle_half_open: std::time::Duration,
        extra_open_grace: std::time::Duration,
    ) {
        match self.state {
            CircuitState::HalfOpen => {
                let idle = self
                    .last_request
                    .map(|t| t.elapsed() >= idle_half_open)
                    .unwrap_or(true);
                if idle {
                    self.transition_to(CircuitState::Closed, config, events);
                }
            }
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.wait_duration_in_open + extra_open_grace {
                    self.transition_to(CircuitState::HalfOpen, config, events);
                }
            }
            CircuitState::Closed => {}
        }
    }

    fn push_record(&mut self, config: &CircuitBreakerConfig, is_failure: bool) {
        self.history.push_back(CallRecord {
            timestamp: Instant::now(),
            is_failure,
        });
        while self.history.len() > config.monitoring_window {
            self.history.pop_front();
        }
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        events: &EventBus<CircuitBreakerEvent>,
    ) {
        if self.state == state {
            return;
        }
        let from_state = self.state;

        events.publish(&CircuitBreakerEvent::StateTransition {
            service_id: config.name.clone(),
            timestamp: Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::warn!(service = %config.name, from = from_state.label(), to = state.label(), "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "service" => config.name.clone(),
                "from" => from_state.label(),
                "to" => state.label()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "service" => config.name.clone()).set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.history.clear();
    }
}
