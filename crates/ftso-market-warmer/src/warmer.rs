//! Cache warmer: tracks feed access patterns and proactively refreshes the
//! hot ones before their entries fall out of the cache.

use crate::access_pattern::AccessPattern;
use crate::config::WarmerConfig;
use crate::error::WarmerError;
use ftso_market_cache::{MarketDataEntry, RealtimeCache};
use ftso_market_core::FeedId;
use futures::future::BoxFuture;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Fetches a fresh value for one feed. Implemented by the orchestrator
/// crate over its exchange adapters; kept as a trait here so the warmer
/// has no compile-time dependency on any specific transport.
pub trait WarmSource: Send + Sync {
    fn fetch<'a>(&'a self, feed: &'a FeedId) -> BoxFuture<'a, Result<MarketDataEntry, WarmerError>>;
}

impl<F> WarmSource for F
where
    F: for<'a> Fn(&'a FeedId) -> BoxFuture<'a, Result<MarketDataEntry, WarmerError>> + Send + Sync,
{
    fn fetch<'a>(&'a self, feed: &'a FeedId) -> BoxFuture<'a, Result<MarketDataEntry, WarmerError>> {
        self(feed)
    }
}

#[derive(Debug, Default, Clone)]
pub struct WarmupStats {
    pub total_warmed: u64,
    pub total_failed: u64,
    pub tracked_feeds: usize,
    pub last_cycle_warmed: u64,
    /// The hottest tracked feeds by priority score, stale entries excluded
    /// (spec §4.2 "getWarmupStats(): exposes counts and the top-N ranked
    /// feeds"; spec §9 Open Question: the getter, not the tracker, is
    /// where `staleThresholdMs` filtering applies).
    pub top_feeds: Vec<FeedId>,
}

/// How many ranked feeds [`CacheWarmer::get_warmup_stats`] reports.
const TOP_FEEDS_LIMIT: usize = 10;

#[derive(Default)]
struct Counters {
    total_warmed: AtomicU64,
    total_failed: AtomicU64,
    last_cycle_warmed: AtomicU64,
}

/// Which strategy selected a given cycle candidate, so its fetch can be
/// bounded by that strategy's own `concurrency` rather than a shared pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyKind {
    Critical,
    Predictive,
    Maintenance,
}

/// Per-strategy semaphores sized from `StrategyTuning::concurrency`, kept
/// separate from the immediate-warm semaphore so a maintenance sweep can
/// never starve critical-feed warms of their own concurrency budget.
struct StrategySemaphores {
    critical: Arc<Semaphore>,
    predictive: Arc<Semaphore>,
    maintenance: Arc<Semaphore>,
}

impl StrategySemaphores {
    fn new(config: &WarmerConfig) -> Self {
        Self {
            critical: Arc::new(Semaphore::new(config.strategies.critical.concurrency)),
            predictive: Arc::new(Semaphore::new(config.strategies.predictive.concurrency)),
            maintenance: Arc::new(Semaphore::new(config.strategies.maintenance.concurrency)),
        }
    }

    fn for_kind(&self, kind: StrategyKind) -> Arc<Semaphore> {
        match kind {
            StrategyKind::Critical => Arc::clone(&self.critical),
            StrategyKind::Predictive => Arc::clone(&self.predictive),
            StrategyKind::Maintenance => Arc::clone(&self.maintenance),
        }
    }
}

/// Proactively refreshes cache entries for feeds under active access,
/// bounding concurrent source calls with a semaphore the same way the
/// bulkhead pattern bounds concurrent calls to a downstream service.
pub struct CacheWarmer {
    config: WarmerConfig,
    cache: Arc<RealtimeCache>,
    source: Arc<dyn WarmSource>,
    patterns: Mutex<HashMap<FeedId, AccessPattern>>,
    /// Bounds immediate (access-triggered) warms dispatched from
    /// `track_feed_access`.
    immediate_semaphore: Arc<Semaphore>,
    strategy_semaphores: StrategySemaphores,
    counters: Counters,
}

impl CacheWarmer {
    pub fn new(config: WarmerConfig, cache: Arc<RealtimeCache>, source: Arc<dyn WarmSource>) -> Self {
        let immediate_semaphore = Arc::new(Semaphore::new(config.max_concurrent_warms));
        let strategy_semaphores = StrategySemaphores::new(&config);
        Self {
            config,
            cache,
            source,
            patterns: Mutex::new(HashMap::new()),
            immediate_semaphore,
            strategy_semaphores,
            counters: Counters::default(),
        }
    }

    /// Records that `feed` was read, feeding the priority model that
    /// decides what gets warmed next cycle. Also implements spec §4.2's
    /// immediate-warming trigger: on the feed's very first access, once its
    /// access count crosses `immediate_access_threshold`, or once its
    /// rolling average access interval drops below `frequent_access_interval`,
    /// a single background warm is dispatched for it right away rather than
    /// waiting for the next cycle — coalesced via `AccessPattern::try_begin_warm`
    /// so a burst of accesses to the same hot feed never queues more than one
    /// warm in flight for it (spec §9's "warming storm" note).
    pub fn track_feed_access(self: &Arc<Self>, feed: &FeedId) {
        let should_warm = {
            let mut patterns = self.patterns.lock().unwrap();
            let pattern = patterns
                .entry(feed.clone())
                .or_insert_with(|| AccessPattern::new(feed.clone()));

            let first_access = pattern.record_access(&self.config.priority);
            let crosses_immediate_threshold = pattern.access_count >= self.config.immediate_access_threshold;
            let is_frequent = pattern
                .average_interval
                .map(|avg| avg < self.config.frequent_access_interval)
                .unwrap_or(false);

            (first_access || crosses_immediate_threshold || is_frequent)
                && pattern.try_begin_warm(self.config.min_rewarm_interval)
        };

        if !should_warm {
            return;
        }

        let this = Arc::clone(self);
        let feed = feed.clone();
        tokio::spawn(async move {
            let _permit = this.immediate_semaphore.acquire().await.ok();
            if let Err(err) = this.warm_one(&feed).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(feed = %feed, error = %err, "immediate feed warm failed");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
            }
        });
    }

    /// Fetches and writes back a single feed, updating counters and
    /// clearing its in-flight flag regardless of outcome. Shared by the
    /// immediate-warm path and the per-cycle strategy fan-out.
    async fn warm_one(&self, feed: &FeedId) -> Result<(), WarmerError> {
        let outcome = self.source.fetch(feed).await;
        let success = outcome.is_ok();
        match &outcome {
            Ok(entry) => {
                self.cache.set(feed, entry.clone(), self.cache.config().max_ttl);
                self.counters.total_warmed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.counters.total_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(pattern) = self.patterns.lock().unwrap().get_mut(feed) {
            pattern.mark_warmed(success, &self.config.priority);
        }
        outcome.map(|_| ())
    }

    /// Runs one warming cycle: selects feeds by strategy (critical,
    /// predictive, maintenance), then fetches and writes them back to the
    /// cache with each strategy's own fan-out bounded by its own
    /// `concurrency`.
    pub async fn warm_feed_cache(&self) -> WarmupStats {
        let candidates = self.select_candidates();
        let mut handles = Vec::with_capacity(candidates.len());

        for (feed, kind) in candidates {
            let semaphore = self.strategy_semaphores.for_kind(kind);
            let source = Arc::clone(&self.source);
            let cache = Arc::clone(&self.cache);
            handles.push(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some((feed.clone(), source.fetch(&feed).await, cache))
            });
        }

        let results = futures::future::join_all(handles).await;
        let mut warmed_this_cycle = 0u64;

        for result in results.into_iter().flatten() {
            let (feed, outcome, cache) = result;
            let success = outcome.is_ok();
            match outcome {
                Ok(entry) => {
                    cache.set(&feed, entry, cache.config().max_ttl);
                    self.counters.total_warmed.fetch_add(1, Ordering::Relaxed);
                    warmed_this_cycle += 1;
                }
                Err(_) => {
                    self.counters.total_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            if let Some(pattern) = self.patterns.lock().unwrap().get_mut(&feed) {
                pattern.mark_warmed(success, &self.config.priority);
            }
        }

        self.counters
            .last_cycle_warmed
            .store(warmed_this_cycle, Ordering::Relaxed);

        self.get_warmup_stats()
    }

    pub fn get_warmup_stats(&self) -> WarmupStats {
        let patterns = self.patterns.lock().unwrap();
        WarmupStats {
            total_warmed: self.counters.total_warmed.load(Ordering::Relaxed),
            total_failed: self.counters.total_failed.load(Ordering::Relaxed),
            tracked_feeds: patterns.len(),
            last_cycle_warmed: self.counters.last_cycle_warmed.load(Ordering::Relaxed),
            top_feeds: self.ranked_feeds(&patterns, TOP_FEEDS_LIMIT),
        }
    }

    /// The `limit` hottest tracked feeds by priority score, stale entries
    /// excluded (spec §9 Open Question: ranking getters filter on
    /// `stale_threshold`, the tracker itself never does).
    pub fn popular_feeds(&self, limit: usize) -> Vec<FeedId> {
        self.ranked_feeds(&self.patterns.lock().unwrap(), limit)
    }

    fn ranked_feeds(&self, patterns: &HashMap<FeedId, AccessPattern>, limit: usize) -> Vec<FeedId> {
        let mut ranked: Vec<(&FeedId, f64)> = patterns
            .values()
            .filter(|p| !p.is_stale(self.config.stale_threshold))
            .map(|p| (&p.feed, p.priority_score()))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(CmpOrdering::Equal));
        ranked.into_iter().take(limit).map(|(feed, _)| feed.clone()).collect()
    }

    /// Selects feeds to warm this cycle according to the configured
    /// strategies, skipping any feed already in flight or in a warming
    /// storm window (re-warmed within `min_rewarm_interval`). Each
    /// strategy's candidate set is disjoint (critical first, then
    /// predictive, then maintenance) and independently capped at its own
    /// `target_feeds` before the three are merged, so e.g. a wide
    /// maintenance sweep can never crowd out the critical tier's own
    /// concurrency-bounded slice (spec §4.2, §8 "never duplicates").
    fn select_candidates(&self) -> Vec<(FeedId, StrategyKind)> {
        let strategies = &self.config.strategies;
        let mut patterns = self.patterns.lock().unwrap();

        let mut critical: Vec<(FeedId, f64)> = Vec::new();
        let mut predictive: Vec<(FeedId, f64)> = Vec::new();
        let mut maintenance: Vec<(FeedId, f64)> = Vec::new();

        for pattern in patterns.values() {
            if pattern.is_warming_storm(self.config.min_rewarm_interval) {
                continue;
            }

            let stale = pattern.is_stale(self.config.stale_threshold);
            let score = pattern.priority_score();

            if strategies.critical.enabled && score >= self.config.critical_priority_threshold {
                critical.push((pattern.feed.clone(), score));
            } else if strategies.predictive.enabled && pattern.is_due_soon(self.config.predictive_window) {
                predictive.push((pattern.feed.clone(), score));
            } else if strategies.maintenance.enabled && stale {
                maintenance.push((pattern.feed.clone(), score));
            }
        }

        let cap_by_score = |mut v: Vec<(FeedId, f64)>, cap: usize| {
            v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(CmpOrdering::Equal));
            v.truncate(cap);
            v
        };

        let critical = cap_by_score(critical, strategies.critical.target_feeds);
        let predictive = cap_by_score(predictive, strategies.predictive.target_feeds);
        let maintenance = cap_by_score(maintenance, strategies.maintenance.target_feeds);

        for (feed, _) in critical.iter().chain(predictive.iter()).chain(maintenance.iter()) {
            if let Some(pattern) = patterns.get_mut(feed) {
                pattern.in_flight = true;
            }
        }

        let mut result = Vec::with_capacity(critical.len() + predictive.len() + maintenance.len());
        result.extend(critical.into_iter().map(|(f, _)| (f, StrategyKind::Critical)));
        result.extend(predictive.into_iter().map(|(f, _)| (f, StrategyKind::Predictive)));
        result.extend(maintenance.into_iter().map(|(f, _)| (f, StrategyKind::Maintenance)));
        result
    }

    pub fn warm_interval(&self) -> Duration {
        self.config.warm_interval
    }
}
