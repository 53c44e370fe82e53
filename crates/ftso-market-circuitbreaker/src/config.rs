//! Per-service circuit breaker tuning.

use std::time::Duration;

/// Tuning for one service's circuit.
///
/// Unlike a rate-based sliding window, trip decisions here are made on
/// consecutive failures — simpler to reason about for a small number of
/// long-lived upstream connections (exchange adapters, REST fallbacks)
/// where "N in a row" is a clearer health signal than a failure rate over
/// a rolling window of mixed call volume.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitBreakerConfig {
    pub name: String,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// Consecutive successes in half-open before the circuit closes.
    pub success_threshold: usize,
    /// How long the circuit stays open before allowing a half-open probe.
    pub wait_duration_in_open: Duration,
    /// Bound on the retained call-record history used for metrics; does
    /// not affect trip decisions, which only look at the consecutive run.
    pub monitoring_window: usize,
    /// Wall-clock budget for a single breaker-protected call (spec §3/§4.3:
    /// "every breaker-wrapped operation has an operationTimeout"). The
    /// retry executor enforces this with `tokio::time::timeout` and counts
    /// an elapsed deadline as a failure.
    pub operation_timeout: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 10,
            success_threshold: 1,
            wait_duration_in_open: Duration::from_secs(30),
            monitoring_window: 500,
            operation_timeout: Duration::from_secs(5),
        }
    }

    /// Preset for custom (Tier 1) exchange adapters: trip after 10
    /// consecutive failures, a single success is enough to close again.
    pub fn adapter(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// Preset for CCXT-backed (Tier 2) exchange sources: a slightly higher
    /// threshold since these sources tend to see more transient noise.
    pub fn exchange_source(name: impl Into<String>) -> Self {
        Self {
            failure_threshold: 15,
            success_threshold: 1,
            ..Self::new(name)
        }
    }

    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n;
        self
    }

    pub fn success_threshold(mut self, n: usize) -> Self {
        self.success_threshold = n;
        self
    }

    pub fn wait_duration_in_open(mut self, d: Duration) -> Self {
        self.wait_duration_in_open = d;
        self
    }

    pub fn monitoring_window(mut self, n: usize) -> Self {
        self.monitoring_window = n;
        self
    }

    pub fn operation_timeout(mut self, d: Duration) -> Self {
        self.operation_timeout = d;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_preset_matches_spec_default() {
        let config = CircuitBreakerConfig::adapter("binance");
        assert_eq!(config.failure_threshold, 10);
    }

    #[test]
    fn exchange_source_preset_matches_spec_default() {
        let config = CircuitBreakerConfig::exchange_source("ccxt-kraken");
        assert_eq!(config.failure_threshold, 15);
        assert_eq!(config.success_threshold, 1);
    }

    #[test]
    fn operation_timeout_builder_overrides_default() {
        let config = CircuitBreakerConfig::new("binance").operation_timeout(Duration::from_millis(250));
        assert_eq!(config.operation_timeout, Duration::from_millis(250));
    }
}
