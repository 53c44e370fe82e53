//! The aggregation facade (spec §2): fans a single feed request across
//! configured exchange adapters, merges prices, and fills the cache.
//! Everything else in this crate wires an axum/tonic handler can call
//! directly into the seven reliability/data components this facade owns.

use crate::config::{MarketDataConfig, RetryKnobs};
use crate::http_types::{
    CurrentValuesRequest, CurrentValuesResponse, ExchangeVolume, FeedFailure, FeedValue,
    FeedVolumes, HistoricalRequest, HistoricalResponse, MetricsResponse, ValueSource,
    VolumesRequest, VolumesResponse,
};
use ftso_market_cache::{MarketDataEntry, RealtimeCache};
use ftso_market_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use ftso_market_core::{FeedId, SourceTier};
use ftso_market_errorhandler::{HealthProbe, TieredErrorHandler};
use ftso_market_failover::{ConnectionRecovery, DataSourceRegistry};
use ftso_market_orchestrator::{AdapterError, ExchangeAdapter, PriceTick, WebSocketOrchestrator};
use ftso_market_retry::{ExponentialBackoff, PredicateClassifier, RetryConfig, RetryExecutor};
use ftso_market_warmer::{CacheWarmer, WarmSource, WarmerError, WarmupStats};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One exchange's failure to answer a single resolution attempt; joined
/// into the HTTP-facing [`FeedFailure`] reason and separately fed to the
/// tiered error handler so circuit breaker/failover state tracks it.
struct SourceFailure {
    source_id: String,
    reason: String,
}

fn join_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.source_id, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

fn retryable_adapter_error(error: &AdapterError) -> bool {
    !matches!(error, AdapterError::Unsupported)
}

/// Converts the user-facing [`RetryKnobs`] into a concrete `RetryConfig`
/// (see that type's doc comment). `max_attempts` is `max_retries + 1` since
/// the executor's attempt budget counts the initial try along with retries.
fn retry_config_from_knobs(name: impl Into<String>, knobs: &RetryKnobs) -> RetryConfig {
    RetryConfig::new(
        name,
        knobs.max_retries + 1,
        Arc::new(
            ExponentialBackoff::new(Duration::from_millis(knobs.initial_delay_ms))
                .multiplier(knobs.backoff_multiplier)
                .max_interval(Duration::from_millis(knobs.max_delay_ms))
                .jitter(knobs.jitter),
        ),
    )
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Confidence-weighted average across every source that answered, falling
/// back to a plain average if every tick reported zero confidence.
fn merge_ticks(ticks: Vec<PriceTick>) -> MarketDataEntry {
    let total_confidence: f64 = ticks.iter().map(|t| t.confidence).sum();
    let price = if total_confidence > 0.0 {
        ticks.iter().map(|t| t.price * t.confidence).sum::<f64>() / total_confidence
    } else {
        ticks.iter().map(|t| t.price).sum::<f64>() / ticks.len() as f64
    };
    let confidence = total_confidence / ticks.len() as f64;
    let sources = ticks.iter().map(|t| t.source.clone()).collect();
    MarketDataEntry::new(price, sources, confidence)
}

/// Fans a single feed out across every `{exchange, symbol}` pair configured
/// for it, issuing a breaker-and-retry-wrapped REST pull per source and
/// merging whatever answers. Shared by the facade's own cache-miss path and
/// the cache warmer's background refresh, so both see identical behavior.
async fn resolve_feed(
    orchestrator: &WebSocketOrchestrator,
    retry: &RetryExecutor,
    retry_config: &RetryConfig,
    feed: &FeedId,
) -> Result<MarketDataEntry, Vec<SourceFailure>> {
    let sources = orchestrator.sources_for_feed(feed).await;
    if sources.is_empty() {
        return Err(vec![SourceFailure {
            source_id: feed.encode(),
            reason: "no sources configured for feed".to_string(),
        }]);
    }

    let classifier = PredicateClassifier::new(retryable_adapter_error);
    let mut ticks = Vec::new();
    let mut failures = Vec::new();

    for source in sources {
        let Some(adapter) = orchestrator.adapter(&source.exchange) else {
            failures.push(SourceFailure {
                source_id: source.exchange.clone(),
                reason: "no adapter registered for this exchange".to_string(),
            });
            continue;
        };

        if !adapter.capabilities().rest {
            failures.push(SourceFailure {
                source_id: source.exchange.clone(),
                reason: "adapter has no REST capability".to_string(),
            });
            continue;
        }

        let symbol = source.symbol.clone();
        let adapter = Arc::clone(&adapter);
        let result = retry
            .execute_with_retry(&source.exchange, retry_config, &classifier, || {
                let adapter = Arc::clone(&adapter);
                let symbol = symbol.clone();
                async move { adapter.fetch_ticker_rest(&symbol).await }
            })
            .await;

        match result {
            Ok(tick) => ticks.push(tick),
            Err(err) => failures.push(SourceFailure {
                source_id: source.exchange.clone(),
                reason: err.to_string(),
            }),
        }
    }

    if ticks.is_empty() {
        Err(failures)
    } else {
        Ok(merge_ticks(ticks))
    }
}

/// Backs the cache warmer's background refresh with the same fan-out path
/// used by the facade's own cache-miss resolution, so a warmed entry and an
/// on-demand one are produced identically.
struct OrchestratorWarmSource {
    orchestrator: Arc<WebSocketOrchestrator>,
    retry: Arc<RetryExecutor>,
    retry_config: RetryConfig,
}

impl WarmSource for OrchestratorWarmSource {
    fn fetch<'a>(&'a self, feed: &'a FeedId) -> BoxFuture<'a, Result<MarketDataEntry, WarmerError>> {
        Box::pin(async move {
            resolve_feed(&self.orchestrator, &self.retry, &self.retry_config, feed)
                .await
                .map_err(|failures| WarmerError::SourceFailed {
                    feed: feed.to_string(),
                    message: join_failures(&failures),
                })
        })
    }
}

/// Ties cache, warmer, circuit breaker, retry, failover, error handler, and
/// orchestrator behind the single entry point an HTTP handler calls.
pub struct MarketDataService {
    config: MarketDataConfig,
    cache: Arc<RealtimeCache>,
    warmer: Arc<CacheWarmer>,
    orchestrator: Arc<WebSocketOrchestrator>,
    retry: Arc<RetryExecutor>,
    retry_config: RetryConfig,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    error_handler: Arc<TieredErrorHandler>,
    sources: Arc<DataSourceRegistry>,
    recovery: Arc<ConnectionRecovery>,
    /// Last successfully resolved `(price, confidence)` per feed (keyed by
    /// `FeedId::encode()`), consulted only when CCXT-backup mode is active
    /// for a feed and the current resolution attempt still fails entirely
    /// (spec §6's `fallback_error` value source).
    last_known: Mutex<HashMap<String, (f64, f64)>>,
}

impl MarketDataService {
    /// Connects every registered adapter and subscribes the configured
    /// feeds (spec §4.7 phases 1-4), then syncs each exchange's recorded
    /// health from the orchestrator's post-connect state.
    pub async fn initialize(&self) {
        self.orchestrator.initialize(self.config.feeds.clone()).await;

        let exchanges: HashSet<String> = self
            .config
            .feeds
            .iter()
            .flat_map(|entry| entry.sources.iter().map(|s| s.exchange.clone()))
            .collect();

        for exchange in exchanges {
            let Some(health) = self.sources.health(&exchange) else {
                continue;
            };
            if self.orchestrator.is_exchange_connected(&exchange).await {
                health.mark_connected();
            } else {
                health.mark_disconnected("adapter failed to connect during initialize");
            }
        }
    }

    /// Current values for the requested feeds (spec §6 "Current values"):
    /// cache hit first, fan-out to adapters on miss, partial success
    /// preferred over total failure (spec §7).
    pub async fn get_current_values(&self, request: CurrentValuesRequest) -> CurrentValuesResponse {
        let results =
            futures::future::join_all(request.feeds.iter().map(|feed| self.current_value(feed))).await;

        let mut values = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(failure) => failures.push(failure),
            }
        }
        CurrentValuesResponse { values, failures }
    }

    async fn current_value(&self, feed: &FeedId) -> Result<FeedValue, FeedFailure> {
        self.warmer.track_feed_access(feed);

        if let Some(entry) = self.cache.get(feed) {
            return Ok(FeedValue {
                feed: feed.clone(),
                value: entry.price,
                timestamp_millis: now_millis(),
                confidence: entry.confidence,
                source: ValueSource::Cache,
            });
        }

        match resolve_feed(&self.orchestrator, &self.retry, &self.retry_config, feed).await {
            Ok(entry) => {
                self.cache
                    .set_price(feed, entry.price, entry.sources.clone(), entry.confidence);
                self.remember_last_known(feed, entry.price, entry.confidence);
                let source = if self.error_handler.is_ccxt_backup_active(&feed.encode()) {
                    ValueSource::Fallback
                } else {
                    ValueSource::Aggregated
                };
                Ok(FeedValue {
                    feed: feed.clone(),
                    value: entry.price,
                    timestamp_millis: now_millis(),
                    confidence: entry.confidence,
                    source,
                })
            }
            Err(failures) => {
                self.report_failures(feed, &failures).await;

                // CCXT-backup mode is active for this feed and even the
                // backup-aware fan-out above failed completely: serve the
                // last known good value rather than a hard failure (spec
                // §6's `fallback_error` source).
                if self.error_handler.is_ccxt_backup_active(&feed.encode()) {
                    if let Some((price, confidence)) = self.last_known(feed) {
                        return Ok(FeedValue {
                            feed: feed.clone(),
                            value: price,
                            timestamp_millis: now_millis(),
                            confidence,
                            source: ValueSource::FallbackError,
                        });
                    }
                }

                Err(FeedFailure {
                    feed: feed.clone(),
                    reason: join_failures(&failures),
                })
            }
        }
    }

    fn remember_last_known(&self, feed: &FeedId, price: f64, confidence: f64) {
        self.last_known
            .lock()
            .unwrap()
            .insert(feed.encode(), (price, confidence));
    }

    fn last_known(&self, feed: &FeedId) -> Option<(f64, f64)> {
        self.last_known.lock().unwrap().get(&feed.encode()).copied()
    }

    /// Per-voting-round values (spec §6 "Historical"): cached voting-round
    /// entries are returned as-is; a miss is resolved fresh and cached with
    /// the 60s historical TTL rather than the cache's general `maxTTL`.
    pub async fn get_historical(&self, request: HistoricalRequest) -> HistoricalResponse {
        let round = request.voting_round_id;
        let results = futures::future::join_all(
            request.feeds.iter().map(|feed| self.historical_value(feed, round)),
        )
        .await;

        let mut data = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(value) => data.push(value),
                Err(failure) => failures.push(failure),
            }
        }
        HistoricalResponse {
            voting_round_id: round,
            data,
            failures,
        }
    }

    async fn historical_value(&self, feed: &FeedId, round: u64) -> Result<FeedValue, FeedFailure> {
        if let Some(entry) = self.cache.get_for_voting_round(feed, round) {
            return Ok(FeedValue {
                feed: feed.clone(),
                value: entry.price,
                timestamp_millis: now_millis(),
                confidence: entry.confidence,
                source: ValueSource::Cache,
            });
        }

        match resolve_feed(&self.orchestrator, &self.retry, &self.retry_config, feed).await {
            Ok(entry) => {
                self.cache
                    .set_for_voting_round(feed, round, entry.clone(), self.config.historical_ttl);
                Ok(FeedValue {
                    feed: feed.clone(),
                    value: entry.price,
                    timestamp_millis: now_millis(),
                    confidence: entry.confidence,
                    source: ValueSource::Aggregated,
                })
            }
            Err(failures) => {
                self.report_failures(feed, &failures).await;
                Err(FeedFailure {
                    feed: feed.clone(),
                    reason: join_failures(&failures),
                })
            }
        }
    }

    /// Per-exchange volumes (spec §6 "Volumes"). Volume is not part of the
    /// cached [`MarketDataEntry`] (spec §3's cache entry carries only
    /// price/sources/confidence), so this bypasses the cache entirely and
    /// reports each source's latest REST tick; `window` is accepted for API
    /// parity but there is no windowed volume buffer to apply it against.
    pub async fn get_volumes(&self, request: VolumesRequest) -> VolumesResponse {
        let _window = request.window.unwrap_or(self.config.default_volume_window);
        let feeds =
            futures::future::join_all(request.feeds.iter().map(|feed| self.feed_volumes(feed))).await;
        VolumesResponse { feeds }
    }

    async fn feed_volumes(&self, feed: &FeedId) -> FeedVolumes {
        let sources = self.orchestrator.sources_for_feed(feed).await;
        let classifier = PredicateClassifier::new(retryable_adapter_error);
        let mut volumes = Vec::new();

        for source in sources {
            let Some(adapter) = self.orchestrator.adapter(&source.exchange) else {
                continue;
            };
            if !adapter.capabilities().rest || !adapter.capabilities().volume {
                continue;
            }

            let symbol = source.symbol.clone();
            let adapter = Arc::clone(&adapter);
            let result = self
                .retry
                .execute_with_retry(&source.exchange, &self.retry_config, &classifier, || {
                    let adapter = Arc::clone(&adapter);
                    let symbol = symbol.clone();
                    async move { adapter.fetch_ticker_rest(&symbol).await }
                })
                .await;

            if let Ok(tick) = result {
                if let Some(volume) = tick.volume {
                    volumes.push(ExchangeVolume {
                        exchange: source.exchange,
                        volume,
                    });
                }
            }
        }

        FeedVolumes {
            feed: feed.clone(),
            volumes,
        }
    }

    /// Read-only aggregation across every component's counters (spec §6
    /// "Metrics / health").
    pub fn metrics(&self) -> MetricsResponse {
        MetricsResponse {
            cache: self.cache.stats(),
            warmup: self.warmer.get_warmup_stats(),
            retry: self.retry.stats(),
            system_health: self.recovery.system_health(),
        }
    }

    /// Runs one warming cycle immediately; callers drive the recurring
    /// schedule with [`Self::warm_interval`] on their own ticker.
    pub async fn run_warm_cycle(&self) -> WarmupStats {
        self.warmer.warm_feed_cache().await
    }

    pub fn warm_interval(&self) -> Duration {
        self.warmer.warm_interval()
    }

    /// Disconnects every adapter and clears orchestrator state; background
    /// tickers owned by the cache, circuit breaker registry, and error
    /// handler are stopped when this service (and their `Arc`s) drop.
    /// Also trips the retry executor's shutdown flag (spec §4.4(b), §5) so
    /// any in-flight `resolve_feed` retry loop aborts at its next attempt
    /// boundary instead of continuing to retry against adapters this call
    /// is about to disconnect.
    pub async fn cleanup(&self) {
        self.retry.trigger_shutdown();
        self.orchestrator.cleanup().await;
    }

    async fn report_failures(&self, feed: &FeedId, failures: &[SourceFailure]) {
        for failure in failures {
            if let Err(err) = self
                .error_handler
                .handle_error(&failure.source_id, &failure.reason, Some(feed.clone()), None)
                .await
            {
                #[cfg(feature = "tracing")]
                tracing::warn!(source_id = %failure.source_id, error = %err, "error handler could not execute a response strategy");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
            }
        }
    }
}

/// Fluent builder mirroring the per-crate `*ConfigBuilder` idiom: adapters
/// must be registered before `initialize()` can connect them, so they're
/// collected here rather than via a post-construction setter.
pub struct MarketDataServiceBuilder {
    config: MarketDataConfig,
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    probe: Option<Arc<dyn HealthProbe>>,
}

impl MarketDataServiceBuilder {
    pub fn new(config: MarketDataConfig) -> Self {
        Self {
            config,
            adapters: Vec::new(),
            probe: None,
        }
    }

    pub fn adapter(mut self, adapter: Arc<dyn ExchangeAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Overrides the recovery monitor's health probe (spec §4.5's 30s
    /// sweep). Defaults to each adapter's own `health_check()`.
    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> MarketDataService {
        let mut orchestrator = WebSocketOrchestrator::new();
        for adapter in &self.adapters {
            orchestrator.register_adapter(Arc::clone(adapter));
        }
        let orchestrator = Arc::new(orchestrator);

        let cache = Arc::new(RealtimeCache::new(self.config.cache.clone()));
        let circuit_breakers = Arc::new(CircuitBreakerRegistry::new(self.config.adapter_circuit.clone()));
        let retry = Arc::new(RetryExecutor::new().with_circuit_breakers(Arc::clone(&circuit_breakers)));
        let retry_config = retry_config_from_knobs("exchange-rest", &self.config.retry);
        let sources = Arc::new(DataSourceRegistry::new());
        let recovery = Arc::new(ConnectionRecovery::new(Arc::clone(&sources)));

        for adapter in &self.adapters {
            let tier = SourceTier::from_source_id(adapter.exchange_name());
            sources.register_data_source(adapter.exchange_name(), tier);

            let mut breaker_config = match tier {
                SourceTier::Tier1 => self.config.adapter_circuit.clone(),
                SourceTier::Tier2 => self.config.exchange_circuit.clone(),
            };
            breaker_config.name = adapter.exchange_name().to_string();
            circuit_breakers.configure(adapter.exchange_name(), breaker_config);
        }

        for entry in &self.config.feeds {
            let source_ids: Vec<String> = entry.sources.iter().map(|s| s.exchange.clone()).collect();
            sources.configure_feed_sources(entry.feed.clone(), source_ids);
        }

        let probe = self.probe.unwrap_or_else(|| default_health_probe(Arc::clone(&orchestrator)));
        let error_handler = Arc::new(TieredErrorHandler::new(
            Arc::clone(&circuit_breakers),
            Arc::clone(&recovery),
            Arc::clone(&sources),
            probe,
        ));

        let warm_source: Arc<dyn WarmSource> = Arc::new(OrchestratorWarmSource {
            orchestrator: Arc::clone(&orchestrator),
            retry: Arc::clone(&retry),
            retry_config: retry_config.clone(),
        });
        let warmer = Arc::new(CacheWarmer::new(
            self.config.warmer.clone(),
            Arc::clone(&cache),
            warm_source,
        ));

        MarketDataService {
            config: self.config,
            cache,
            warmer,
            orchestrator,
            retry,
            retry_config,
            circuit_breakers,
            error_handler,
            sources,
            recovery,
            last_known: Mutex::new(HashMap::new()),
        }
    }
}

/// Probes an unhealthy source by delegating to its own adapter's
/// `health_check()`, the same liveness check the orchestrator would use.
fn default_health_probe(orchestrator: Arc<WebSocketOrchestrator>) -> Arc<dyn HealthProbe> {
    Arc::new(move |source_id: &str| -> BoxFuture<'_, bool> {
        let orchestrator = Arc::clone(&orchestrator);
        let source_id = source_id.to_string();
        Box::pin(async move {
            match orchestrator.adapter(&source_id) {
                Some(adapter) => adapter.health_check().await.unwrap_or(false),
                None => false,
            }
        })
    })
}
