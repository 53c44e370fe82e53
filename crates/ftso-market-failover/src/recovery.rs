//! Triggers and tracks failover between data sources.

use crate::error::FailoverError;
use crate::events::FailoverEvent;
use crate::health::ConnectionState;
use crate::registry::DataSourceRegistry;
use ftso_market_core::{EventBus, FeedId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Overall system health label derived from the healthy-to-total source
/// ratio (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SystemHealthLabel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A coarse view of overall source health, used for monitoring dashboards
/// and to decide whether degraded service should be reported upstream.
#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub total_sources: usize,
    /// Sources currently in [`ConnectionState::Connected`], regardless of
    /// recent-failure health (spec §4.6's `connected` count).
    pub connected_sources: usize,
    pub healthy_sources: usize,
    pub degraded_sources: usize,
    /// Sources not currently connected (spec §4.6's `failed` count).
    pub failed_sources: usize,
    pub disconnected_sources: Vec<String>,
    pub label: SystemHealthLabel,
}

impl SystemHealth {
    pub fn is_fully_degraded(&self) -> bool {
        self.total_sources > 0 && self.healthy_sources == 0
    }

    pub fn is_partially_degraded(&self) -> bool {
        self.healthy_sources < self.total_sources
    }

    /// Derives the overall label from the healthy-to-total ratio (spec
    /// §4.6): no sources or every source healthy reads as `Healthy`, no
    /// healthy sources at all reads as `Unhealthy`, anything in between as
    /// `Degraded`.
    fn label_for(total: usize, healthy: usize) -> SystemHealthLabel {
        if total == 0 || healthy == total {
            SystemHealthLabel::Healthy
        } else if healthy == 0 {
            SystemHealthLabel::Unhealthy
        } else {
            SystemHealthLabel::Degraded
        }
    }
}

/// A named strategy for recovering a failed source, surfaced to operators
/// via [`ConnectionRecovery::recovery_strategies`].
#[derive(Debug, Clone)]
pub struct RecoveryStrategy {
    pub source_id: String,
    pub action: RecoveryAction,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Reconnect,
    FailoverToTier2,
    AwaitManualIntervention,
}

/// Coordinates failover decisions across a [`DataSourceRegistry`], emitting
/// [`FailoverEvent`]s as sources go up, down, or get swapped out.
pub struct ConnectionRecovery {
    registry: Arc<DataSourceRegistry>,
    events: EventBus<FailoverEvent>,
}

impl ConnectionRecovery {
    pub fn new(registry: Arc<DataSourceRegistry>) -> Self {
        Self {
            registry,
            events: EventBus::new(),
        }
    }

    pub fn event_bus(&self) -> &EventBus<FailoverEvent> {
        &self.events
    }

    /// Switches a feed from `from_source` to the best remaining healthy
    /// source. The spec requires failover to complete within 100ms of
    /// detecting the failure; callers should invoke this immediately on
    /// detecting a disconnect rather than batching failovers.
    pub async fn trigger_failover(
        &self,
        feed: &FeedId,
        from_source: &str,
    ) -> Result<String, FailoverError> {
        let started = Instant::now();
        let to_source = self.registry.preferred_healthy_source(feed)?;

        let elapsed = started.elapsed();
        #[cfg(feature = "tracing")]
        {
            if elapsed > Duration::from_millis(100) {
                tracing::warn!(feed = %feed, from_source, to_source, elapsed_ms = elapsed.as_millis() as u64, "failover exceeded 100ms target");
            } else {
                tracing::debug!(feed = %feed, from_source, to_source, elapsed_ms = elapsed.as_millis() as u64, "failover completed");
            }
        }

        self.events.publish(FailoverEvent::FailoverCompleted {
            feed: feed.to_string(),
            from_source: from_source.to_string(),
            to_source: to_source.clone(),
            elapsed,
            timestamp: Instant::now(),
        });

        Ok(to_source)
    }

    pub fn notify_connection_restored(&self, source_id: &str) {
        if let Some(health) = self.registry.health(source_id) {
            health.mark_connected();
        }
        self.events.publish(FailoverEvent::ConnectionRestored {
            source_id: source_id.to_string(),
            timestamp: Instant::now(),
        });
    }

    /// Assesses current source health and publishes a degradation event
    /// if service is partially or fully impaired. Returns the computed
    /// [`SystemHealth`] regardless of whether anything changed.
    pub fn implement_graceful_degradation(&self, affected_feeds: Vec<String>) -> SystemHealth {
        let health = self.system_health();

        if health.is_fully_degraded() {
            self.events
                .publish(FailoverEvent::CompleteServiceDegradation {
                    timestamp: Instant::now(),
                });
        } else if health.is_partially_degraded() && !affected_feeds.is_empty() {
            self.events
                .publish(FailoverEvent::PartialServiceDegradation {
                    affected_feeds,
                    timestamp: Instant::now(),
                });
        }

        health
    }

    pub fn system_health(&self) -> SystemHealth {
        let sources = self.registry.all_sources();
        let total_sources = sources.len();
        let connected_sources = sources.iter().filter(|s| s.is_connected()).count();
        let healthy_sources = sources.iter().filter(|s| s.is_healthy()).count();
        let degraded_sources = sources
            .iter()
            .filter(|s| s.is_connected() && !s.is_healthy())
            .count();
        let failed_sources = total_sources - connected_sources;
        let disconnected_sources = sources
            .iter()
            .filter(|s| s.state() != ConnectionState::Connected)
            .map(|s| s.source_id.clone())
            .collect();
        let label = SystemHealth::label_for(total_sources, healthy_sources);

        SystemHealth {
            total_sources,
            connected_sources,
            healthy_sources,
            degraded_sources,
            failed_sources,
            disconnected_sources,
            label,
        }
    }

    /// Recommends an action per unhealthy source: reconnect if failures are
    /// still low, fail over to a Tier 2 backup once failures pile up, or
    /// flag for manual intervention once reconnect attempts are exhausted.
    pub fn recovery_strategies(&self) -> Vec<RecoveryStrategy> {
        const MAX_AUTO_RECONNECT_ATTEMPTS: u32 = 5;

        self.registry
            .all_sources()
            .into_iter()
            .filter(|s| !s.is_healthy())
            .map(|s| {
                let (action, reason) = if s.reconnect_attempts() >= MAX_AUTO_RECONNECT_ATTEMPTS {
                    (
                        RecoveryAction::AwaitManualIntervention,
                        format!("{} reconnect attempts exhausted", s.reconnect_attempts()),
                    )
                } else if s.consecutive_failures() >= 3 {
                    (
                        RecoveryAction::FailoverToTier2,
                        format!("{} consecutive failures", s.consecutive_failures()),
                    )
                } else {
                    (
                        RecoveryAction::Reconnect,
                        "transient disconnect, retrying".to_string(),
                    )
                };

                RecoveryStrategy {
                    source_id: s.source_id.clone(),
                    action,
                    reason,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftso_market_core::{FeedCategory, SourceTier};

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    #[tokio::test]
    async fn failover_picks_next_healthy_source() {
        let registry = Arc::new(DataSourceRegistry::new());
        let primary = registry.register_data_source("binance", SourceTier::Tier1);
        let backup = registry.register_data_source("ccxt-binance", SourceTier::Tier2);
        primary.mark_disconnected("timeout");
        backup.mark_connected();
        registry.configure_feed_sources(feed(), vec!["binance".into(), "ccxt-binance".into()]);

        let recovery = ConnectionRecovery::new(registry);
        let to = recovery.trigger_failover(&feed(), "binance").await.unwrap();
        assert_eq!(to, "ccxt-binance");
    }

    #[test]
    fn system_health_reports_full_degradation() {
        let registry = Arc::new(DataSourceRegistry::new());
        let source = registry.register_data_source("binance", SourceTier::Tier1);
        source.mark_disconnected("down");

        let recovery = ConnectionRecovery::new(registry);
        let health = recovery.system_health();
        assert!(health.is_fully_degraded());
        assert_eq!(health.label, SystemHealthLabel::Unhealthy);
        assert_eq!(health.connected_sources, 0);
        assert_eq!(health.failed_sources, 1);
    }

    #[test]
    fn system_health_label_is_healthy_when_every_source_is_up() {
        let registry = Arc::new(DataSourceRegistry::new());
        let source = registry.register_data_source("binance", SourceTier::Tier1);
        source.mark_connected();

        let recovery = ConnectionRecovery::new(registry);
        let health = recovery.system_health();
        assert_eq!(health.label, SystemHealthLabel::Healthy);
        assert_eq!(health.connected_sources, 1);
        assert_eq!(health.failed_sources, 0);
    }

    #[test]
    fn system_health_label_is_degraded_when_mixed() {
        let registry = Arc::new(DataSourceRegistry::new());
        let up = registry.register_data_source("binance", SourceTier::Tier1);
        up.mark_connected();
        let down = registry.register_data_source("coinbase", SourceTier::Tier1);
        down.mark_disconnected("timeout");

        let recovery = ConnectionRecovery::new(registry);
        let health = recovery.system_health();
        assert_eq!(health.label, SystemHealthLabel::Degraded);
        assert_eq!(health.connected_sources, 1);
        assert_eq!(health.failed_sources, 1);
    }

    #[test]
    fn recovery_strategy_escalates_with_failures() {
        let registry = Arc::new(DataSourceRegistry::new());
        let source = registry.register_data_source("binance", SourceTier::Tier1);
        for _ in 0..3 {
            source.mark_disconnected("boom");
        }

        let recovery = ConnectionRecovery::new(registry);
        let strategies = recovery.recovery_strategies();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].action, RecoveryAction::FailoverToTier2);
    }

    #[test]
    fn manual_intervention_after_exhausted_reconnects() {
        let registry = Arc::new(DataSourceRegistry::new());
        let source = registry.register_data_source("binance", SourceTier::Tier1);
        source.mark_disconnected("down");
        for _ in 0..5 {
            source.mark_reconnecting();
        }

        let recovery = ConnectionRecovery::new(registry);
        let strategies = recovery.recovery_strategies();
        assert_eq!(strategies[0].action, RecoveryAction::AwaitManualIntervention);
    }
}
