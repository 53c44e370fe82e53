//! Tiered error handler: classify, record, select a response strategy, execute it.

use crate::error::ErrorHandlerError;
use crate::events::ErrorHandlerEvent;
use crate::probe::HealthProbe;
use crate::strategy::{select_strategy, ResponseStrategy, StrategyContext};
use ftso_market_circuitbreaker::CircuitBreakerRegistry;
use ftso_market_core::{ClassifiedError, EventBus, FeedId};
use ftso_market_failover::{ConnectionRecovery, DataSourceRegistry};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const MAX_HISTORY_PER_SOURCE: usize = 1000;
const HISTORY_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
const RECENT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Bounded, time-pruned error history for one source.
struct SourceHistory {
    records: VecDeque<Instant>,
}

impl SourceHistory {
    fn new() -> Self {
        Self {
            records: VecDeque::new(),
        }
    }

    fn record(&mut self, at: Instant) {
        self.records.push_back(at);
        while self.records.len() > MAX_HISTORY_PER_SOURCE {
            self.records.pop_front();
        }
        self.prune(at);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.records.front() {
            if now.duration_since(*front) > HISTORY_RETENTION {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    fn recent_count(&self, now: Instant) -> usize {
        self.records
            .iter()
            .rev()
            .take_while(|t| now.duration_since(**t) <= RECENT_WINDOW)
            .count()
    }
}

/// Wires the circuit breaker, retry executor, and failover components
/// behind a single ingestion point, per design note "cyclic / back-references"
/// (spec §9): this handler never holds a live reference back into those
/// components' internals, only `Arc` handles to their public facades.
pub struct TieredErrorHandler {
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    recovery: Arc<ConnectionRecovery>,
    sources: Arc<DataSourceRegistry>,
    events: EventBus<ErrorHandlerEvent>,
    history: Mutex<HashMap<String, SourceHistory>>,
    ccxt_backup_active: Mutex<HashSet<String>>,
    monitor_handle: Option<JoinHandle<()>>,
}

impl TieredErrorHandler {
    pub fn new(
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        recovery: Arc<ConnectionRecovery>,
        sources: Arc<DataSourceRegistry>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let events = EventBus::new();
        let monitor_handle = Some(Self::spawn_recovery_monitor(
            Arc::clone(&sources),
            Arc::clone(&recovery),
            Arc::clone(&circuit_breakers),
            probe,
            events.clone(),
        ));

        Self {
            circuit_breakers,
            recovery,
            sources,
            events,
            history: Mutex::new(HashMap::new()),
            ccxt_backup_active: Mutex::new(HashSet::new()),
            monitor_handle,
        }
    }

    pub fn event_bus(&self) -> EventBus<ErrorHandlerEvent> {
        self.events.clone()
    }

    pub fn is_ccxt_backup_active(&self, feed_key: &str) -> bool {
        self.ccxt_backup_active.lock().unwrap().contains(feed_key)
    }

    /// Classifies a raw error, records it against the source's history,
    /// selects a response strategy, and executes it.
    pub async fn handle_error(
        &self,
        source_id: &str,
        message: &str,
        feed: Option<FeedId>,
        data_age_ms: Option<u64>,
    ) -> Result<ResponseStrategy, ErrorHandlerError> {
        let now = Instant::now();
        let recent_error_count = {
            let mut history = self.history.lock().unwrap();
            let entry = history
                .entry(source_id.to_string())
                .or_insert_with(SourceHistory::new);
            entry.record(now);
            entry.recent_count(now)
        };

        let error = ClassifiedError::classify(source_id, message, feed.clone(), data_age_ms, recent_error_count);
        let ctx = self.strategy_context(&error, feed.as_ref());
        let backoff_estimate = Duration::from_millis(100 * 2u64.pow(recent_error_count.min(5) as u32));
        let strategy = select_strategy(&error, &ctx, backoff_estimate);

        self.events.publish(&ErrorHandlerEvent::StrategySelected {
            source_id: source_id.to_string(),
            strategy: strategy.clone(),
            timestamp: now,
        });

        self.execute_strategy(source_id, feed.as_ref(), &strategy).await?;
        Ok(strategy)
    }

    fn strategy_context(&self, error: &ClassifiedError, feed: Option<&FeedId>) -> StrategyContext {
        let Some(feed) = feed else {
            return StrategyContext::default();
        };

        let configured = self.sources.sources_for_feed(feed);
        let other_healthy_same_tier = configured
            .iter()
            .filter(|id| id.as_str() != error.source_id)
            .filter_map(|id| self.sources.health(id))
            .any(|h| h.is_healthy() && h.tier == error.tier);
        let tier2_available_for_feed = configured
            .iter()
            .filter_map(|id| self.sources.health(id))
            .any(|h| h.tier == ftso_market_core::SourceTier::Tier2);
        let ccxt_backup_available_for_exchange = configured
            .iter()
            .any(|id| id.starts_with("ccxt-") || id.starts_with("ccxt:"));

        StrategyContext {
            other_healthy_same_tier,
            tier2_available_for_feed,
            ccxt_backup_available_for_exchange,
        }
    }

    async fn execute_strategy(
        &self,
        source_id: &str,
        feed: Option<&FeedId>,
        strategy: &ResponseStrategy,
    ) -> Result<(), ErrorHandlerError> {
        match strategy {
            ResponseStrategy::Retry { .. } => {
                // The retry attempt itself is driven by the caller's
                // `RetryExecutor::execute_with_retry` wrapping the original
                // operation; the handler only records circuit-breaker state
                // here so a repeated failure still counts toward the trip
                // threshold even when the caller retries out-of-band.
                self.circuit_breakers.record_failure(source_id);
            }
            ResponseStrategy::Failover | ResponseStrategy::TierFallback => {
                if let Some(feed) = feed {
                    self.recovery.trigger_failover(feed, source_id).await?;
                }
            }
            ResponseStrategy::CcxtBackup => {
                if let Some(feed) = feed {
                    self.ccxt_backup_active.lock().unwrap().insert(feed.encode());
                    self.recovery.trigger_failover(feed, source_id).await?;
                }
            }
            ResponseStrategy::GracefulDegradation { .. } => {
                let affected = feed.map(|f| vec![f.encode()]).unwrap_or_default();
                self.recovery.implement_graceful_degradation(affected);
            }
        }
        Ok(())
    }

    fn spawn_recovery_monitor(
        sources: Arc<DataSourceRegistry>,
        recovery: Arc<ConnectionRecovery>,
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        probe: Arc<dyn HealthProbe>,
        events: EventBus<ErrorHandlerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                ticker.tick().await;
                for health in sources.all_sources() {
                    if health.is_healthy() {
                        continue;
                    }
                    if circuit_breakers.try_acquire(&health.source_id).is_err() {
                        continue;
                    }
                    let recovered = probe.probe(&health.source_id).await;
                    if recovered {
                        circuit_breakers.record_success(&health.source_id);
                        recovery.notify_connection_restored(&health.source_id);
                        events.publish(&ErrorHandlerEvent::SourceRecovered {
                            source_id: health.source_id.clone(),
                            timestamp: Instant::now(),
                        });
                    } else {
                        circuit_breakers.record_failure(&health.source_id);
                    }
                }
            }
        })
    }
}

impl Drop for TieredErrorHandler {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftso_market_circuitbreaker::CircuitBreakerConfig;
    use ftso_market_core::{FeedCategory, SourceTier};
    use futures::future::BoxFuture;

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    fn always_healthy_probe() -> Arc<dyn HealthProbe> {
        Arc::new(|_id: &str| -> BoxFuture<'static, bool> { Box::pin(async { true }) })
    }

    #[tokio::test]
    async fn non_recoverable_error_with_no_backup_selects_graceful_degradation() {
        let circuit_breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::new("default")));
        let sources = Arc::new(DataSourceRegistry::new());
        sources.register_data_source("binance-adapter", SourceTier::Tier1);
        let recovery = Arc::new(ConnectionRecovery::new(Arc::clone(&sources)));

        let handler = TieredErrorHandler::new(circuit_breakers, recovery, sources, always_healthy_probe());
        let strategy = handler
            .handle_error("binance-adapter", "unauthorized: bad token", Some(feed()), None)
            .await
            .unwrap();

        assert!(matches!(strategy, ResponseStrategy::GracefulDegradation { .. }));
    }

    #[tokio::test]
    async fn ccxt_backup_marks_feed_active() {
        let circuit_breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::new("default")));
        let sources = Arc::new(DataSourceRegistry::new());
        sources.register_data_source("binance-adapter", SourceTier::Tier1);
        // "ccxt-binance" is configured as a feed source but never registered
        // with `SourceHealth`, so it can't satisfy tier_fallback (which
        // requires a known healthy Tier2 record) while still satisfying the
        // ccxt_backup string heuristic, isolating the ccxt_backup branch.
        sources.configure_feed_sources(feed(), vec!["binance-adapter".into(), "ccxt-binance".into()]);
        let recovery = Arc::new(ConnectionRecovery::new(Arc::clone(&sources)));

        let handler = TieredErrorHandler::new(circuit_breakers, recovery, sources, always_healthy_probe());
        let strategy = handler
            .handle_error("binance-adapter", "unauthorized: invalid credentials", Some(feed()), None)
            .await
            .unwrap();

        assert_eq!(strategy, ResponseStrategy::CcxtBackup);
        assert!(handler.is_ccxt_backup_active(&feed().encode()));
    }
}
