//! Registry holding one circuit per service, with a periodic health sweep.

use crate::circuit::{Circuit, CircuitMetrics, CircuitState};
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
use crate::events::CircuitBreakerEvent;
use ftso_market_core::EventBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Cadence of the background health sweep (spec §4.3: "every 30s").
const HEALTH_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// A half-open circuit with no request in this long falls back to closed.
const HALF_OPEN_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// Grace added on top of `recoveryTimeout` before an open circuit is
/// force-probed by the sweep rather than waiting on the next request.
const OPEN_CIRCUIT_EXTRA_GRACE: Duration = Duration::from_secs(30);

struct Entry {
    circuit: Circuit,
    config: CircuitBreakerConfig,
    last_open_warning: Option<Instant>,
}

/// Holds one [`Circuit`] per `serviceId`, created lazily from a default or
/// preset config the first time a service is seen.
pub struct CircuitBreakerRegistry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    events: EventBus<CircuitBreakerEvent>,
    default_config: CircuitBreakerConfig,
    /// Minimum gap between repeated "circuit opened" warnings for the same
    /// service, so a flapping upstream doesn't spam the log/metrics.
    open_warning_cooldown: Duration,
    sweep_handle: Option<JoinHandle<()>>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        let entries: Arc<Mutex<HashMap<String, Entry>>> = Arc::new(Mutex::new(HashMap::new()));
        let events = EventBus::new();

        let sweep_handle = {
            let entries = Arc::clone(&entries);
            let events = events.clone();
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(HEALTH_SWEEP_INTERVAL);
                loop {
                    ticker.tick().await;
                    let mut entries = entries.lock().unwrap();
                    for entry in entries.values_mut() {
                        let config = entry.config.clone();
                        // spec §4.3 health sweep: idle half-open probes fall back
                        // closed, and open circuits stuck well past their
                        // recovery timeout are nudged into half-open without
                        // waiting on the next incoming request.
                        entry
                            .circuit
                            .health_sweep(&config, &events, HALF_OPEN_IDLE_TIMEOUT, OPEN_CIRCUIT_EXTRA_GRACE);
                    }
                }
            }))
        };

        Self {
            entries,
            events,
            default_config,
            open_warning_cooldown: Duration::from_secs(60),
            sweep_handle,
        }
    }

    pub fn event_bus(&self) -> EventBus<CircuitBreakerEvent> {
        self.events.clone()
    }

    /// Registers (or overrides) the config for a specific service ahead of
    /// its first call, e.g. to apply the exchange-source preset.
    pub fn configure(&self, service_id: impl Into<String>, config: CircuitBreakerConfig) {
        let service_id = service_id.into();
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            service_id,
            Entry {
                circuit: Circuit::new(),
                config,
                last_open_warning: None,
            },
        );
    }

    pub fn try_acquire(&self, service_id: &str) -> Result<(), CircuitBreakerError> {
        let mut entries = self.entries.lock().unwrap();
        let default_config = self.default_config.clone();
        let entry = entries
            .entry(service_id.to_string())
            .or_insert_with(|| Entry {
                circuit: Circuit::new(),
                config: CircuitBreakerConfig {
                    name: service_id.to_string(),
                    ..default_config
                },
                last_open_warning: None,
            });

        let config = entry.config.clone();
        let result = entry.circuit.try_acquire(&config, &self.events);
        if result.is_err() {
            let now = Instant::now();
            let should_warn = entry
                .last_open_warning
                .map(|t| now.duration_since(t) >= self.open_warning_cooldown)
                .unwrap_or(true);
            if should_warn {
                entry.last_open_warning = Some(now);
                #[cfg(feature = "tracing")]
                tracing::warn!(service = service_id, "circuit open, rejecting call");
            }
        }
        result
    }

    pub fn record_success(&self, service_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(service_id) {
            let config = entry.config.clone();
            entry.circuit.record_success(&config, &self.events);
        }
    }

    pub fn record_failure(&self, service_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(service_id) {
            let config = entry.config.clone();
            entry.circuit.record_failure(&config, &self.events);
        }
    }

    pub fn force_open(&self, service_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(service_id) {
            let config = entry.config.clone();
            entry.circuit.force_open(&config, &self.events);
        }
    }

    pub fn reset(&self, service_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(service_id) {
            let config = entry.config.clone();
            entry.circuit.reset(&config, &self.events);
        }
    }

    pub fn state(&self, service_id: &str) -> Option<CircuitState> {
        self.entries
            .lock()
            .unwrap()
            .get(service_id)
            .map(|e| e.circuit.state())
    }

    /// The operation timeout a breaker-wrapped caller should enforce for
    /// this service: the service's own configured value if it has already
    /// been registered/configured, otherwise the registry's default.
    pub fn operation_timeout(&self, service_id: &str) -> Duration {
        self.entries
            .lock()
            .unwrap()
            .get(service_id)
            .map(|e| e.config.operation_timeout)
            .unwrap_or(self.default_config.operation_timeout)
    }

    pub fn metrics(&self, service_id: &str) -> Option<CircuitMetrics> {
        self.entries
            .lock()
            .unwrap()
            .get(service_id)
            .map(|e| e.circuit.metrics())
    }

    pub fn registered_services(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// Drops a service's circuit entirely (spec §3: "Circuit entries live
    /// from explicit registration until explicit unregistration"). There are
    /// no per-circuit timers to cancel here — recovery is driven by the
    /// registry-wide health sweep rather than a timer per service — so this
    /// is just a map removal.
    pub fn unregister(&self, service_id: &str) {
        self.entries.lock().unwrap().remove(service_id);
    }
}

impl Drop for CircuitBreakerRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_service_starts_closed_and_lazily_registers() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::new("default"));
        assert!(registry.try_acquire("binance").is_ok());
        assert_eq!(registry.state("binance"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn configured_service_uses_its_own_threshold() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::new("default"));
        registry.configure("binance", CircuitBreakerConfig::adapter("binance").failure_threshold(2));

        registry.record_failure("binance");
        registry.record_failure("binance");

        assert_eq!(registry.state("binance"), Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn unregister_drops_the_circuit_and_a_later_call_relazily_registers() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::new("default"));
        registry.configure("binance", CircuitBreakerConfig::adapter("binance").failure_threshold(1));
        registry.record_failure("binance");
        assert_eq!(registry.state("binance"), Some(CircuitState::Open));

        registry.unregister("binance");
        assert_eq!(registry.state("binance"), None);

        assert!(registry.try_acquire("binance").is_ok());
        assert_eq!(registry.state("binance"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn operation_timeout_falls_back_to_default_until_configured() {
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig::new("default").operation_timeout(Duration::from_secs(2)),
        );
        assert_eq!(registry.operation_timeout("binance"), Duration::from_secs(2));

        registry.configure(
            "binance",
            CircuitBreakerConfig::adapter("binance").operation_timeout(Duration::from_millis(500)),
        );
        assert_eq!(registry.operation_timeout("binance"), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn force_open_and_reset_override_state() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::new("default"));
        registry.configure("binance", CircuitBreakerConfig::adapter("binance"));
        registry.force_open("binance");
        assert_eq!(registry.state("binance"), Some(CircuitState::Open));
        registry.reset("binance");
        assert_eq!(registry.state("binance"), Some(CircuitState::Closed));
    }
}
