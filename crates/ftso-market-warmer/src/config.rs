//! Warmer configuration.

use std::time::Duration;

/// Coefficients for the priority-score formula (spec §4.2):
/// `k0 * log(accessCount+1) * recency * frequency * success_rate * time_decay
/// * volume_boost`, clamped to `[priority_min, priority_max]`.
///
/// `recency`/`frequency` are picked from one of three buckets depending on
/// how fresh the feed's last access / rolling access interval is; anything
/// outside all three buckets falls back to the `_default` coefficient.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriorityTuning {
    pub k0: f64,
    pub recency_30m: f64,
    pub recency_2h: f64,
    pub recency_8h: f64,
    pub recency_default: f64,
    pub frequency_15s: f64,
    pub frequency_60s: f64,
    pub frequency_default: f64,
    /// Success-rate coefficient used before a feed has ever been warmed
    /// (`warming_success + warming_failures == 0`).
    pub default_success_rate: f64,
    /// Base half-life (hours) for the exponential time-decay term.
    pub base_half_life_hours: f64,
    /// How much the half-life grows with `log(accessCount+1)`: feeds with a
    /// longer observed history decay more slowly ("adaptive half-life").
    pub half_life_growth: f64,
    /// Multiplier applied for above-average traded volume. The warmer has
    /// no independent view of exchange trade volume, so this is carried as
    /// a neutral constant rather than computed (see `DESIGN.md`).
    pub volume_boost_factor: f64,
    pub priority_min: f64,
    pub priority_max: f64,
}

impl Default for PriorityTuning {
    fn default() -> Self {
        Self {
            k0: 10.0,
            recency_30m: 1.0,
            recency_2h: 0.7,
            recency_8h: 0.4,
            recency_default: 0.15,
            frequency_15s: 1.0,
            frequency_60s: 0.7,
            frequency_default: 0.4,
            default_success_rate: 1.0,
            base_half_life_hours: 4.0,
            half_life_growth: 0.5,
            volume_boost_factor: 1.0,
            priority_min: 0.0,
            priority_max: 100.0,
        }
    }
}

/// Tuning for one named warming strategy (spec §3 "Warming strategy":
/// `name`, `enabled`, `priority`, `targetFeeds`, `concurrency`, `interval`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrategyTuning {
    pub enabled: bool,
    /// Warms at most this many feeds per cycle (spec §4.2: "warms up to
    /// `targetFeeds` of them").
    pub target_feeds: usize,
    /// Bounds the in-flight fetches this strategy's own candidates may
    /// occupy (spec §4.2: "with at most `concurrency` in flight"),
    /// independent of what the other two strategies are doing concurrently.
    pub concurrency: usize,
    /// Cadence this strategy would run on if driven by its own ticker.
    /// `CacheWarmer` evaluates all three strategies from one shared cycle
    /// (see `DESIGN.md`), so this value is carried for API/data-model
    /// completeness and for callers that want to derive an external
    /// schedule from it, rather than driving a timer internally.
    pub interval: Duration,
}

impl StrategyTuning {
    fn new(enabled: bool, target_feeds: usize, concurrency: usize, interval: Duration) -> Self {
        Self {
            enabled,
            target_feeds,
            concurrency,
            interval,
        }
    }
}

/// Which warming strategies run each cycle, how many feeds each may claim,
/// and how much concurrency each gets.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WarmingStrategyConfig {
    /// Feeds whose priority score exceeds `critical_priority_threshold` are
    /// warmed every cycle regardless of recent access, keeping hot feeds
    /// always-fresh. Spec §4.2: "every few seconds".
    pub critical: StrategyTuning,
    /// Feeds are warmed ahead of expected access based on historical
    /// interval patterns. Spec §4.2: "tens of seconds".
    pub predictive: StrategyTuning,
    /// A full low-priority sweep that re-warms everything tracked, run
    /// less frequently to bound source load. Spec §4.2: "minutes".
    pub maintenance: StrategyTuning,
}

impl Default for WarmingStrategyConfig {
    fn default() -> Self {
        Self {
            critical: StrategyTuning::new(true, 20, 5, Duration::from_secs(5)),
            predictive: StrategyTuning::new(true, 50, 10, Duration::from_secs(30)),
            maintenance: StrategyTuning::new(true, 200, 20, Duration::from_secs(300)),
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WarmerConfig {
    /// Upper bound on in-flight immediate (access-triggered) warm
    /// operations, enforced by a semaphore so an access burst can never
    /// flood the exchange adapters. Per-strategy cycle warms are bounded
    /// instead by each `StrategyTuning::concurrency`.
    pub max_concurrent_warms: usize,
    /// Access patterns with no read in this long are excluded from
    /// predictive/critical warming and left to the maintenance sweep.
    pub stale_threshold: Duration,
    /// Interval between warming cycles.
    pub warm_interval: Duration,
    /// Priority score above which a feed is considered "critical".
    pub critical_priority_threshold: f64,
    /// Minimum gap between two warm attempts for the same feed, so a burst
    /// of accesses to one feed doesn't trigger a warming storm against it.
    pub min_rewarm_interval: Duration,
    /// `track_feed_access` on an access count at or above this threshold
    /// fires an immediate background warm (spec §4.2: "the record crosses
    /// an 'immediate threshold' access count").
    pub immediate_access_threshold: u64,
    /// `track_feed_access` fires an immediate background warm when the
    /// feed's rolling average access interval drops below this (spec
    /// §4.2: "the running interval is below a 'frequent' threshold").
    pub frequent_access_interval: Duration,
    /// How far ahead of a feed's predicted next access the predictive
    /// strategy is allowed to warm it (spec §4.2: `predictedNextAccess -
    /// now` must fall in `(0, predictive_window]`).
    pub predictive_window: Duration,
    pub priority: PriorityTuning,
    pub strategies: WarmingStrategyConfig,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_warms: 10,
            stale_threshold: Duration::from_secs(300),
            warm_interval: Duration::from_secs(5),
            critical_priority_threshold: 10.0,
            min_rewarm_interval: Duration::from_millis(500),
            immediate_access_threshold: 50,
            frequent_access_interval: Duration::from_secs(15),
            predictive_window: Duration::from_secs(60),
            priority: PriorityTuning::default(),
            strategies: WarmingStrategyConfig::default(),
        }
    }
}

pub struct WarmerConfigBuilder {
    config: WarmerConfig,
}

impl WarmerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WarmerConfig::default(),
        }
    }

    pub fn max_concurrent_warms(mut self, n: usize) -> Self {
        self.config.max_concurrent_warms = n;
        self
    }

    pub fn stale_threshold(mut self, d: Duration) -> Self {
        self.config.stale_threshold = d;
        self
    }

    pub fn warm_interval(mut self, d: Duration) -> Self {
        self.config.warm_interval = d;
        self
    }

    pub fn critical_priority_threshold(mut self, threshold: f64) -> Self {
        self.config.critical_priority_threshold = threshold;
        self
    }

    pub fn min_rewarm_interval(mut self, d: Duration) -> Self {
        self.config.min_rewarm_interval = d;
        self
    }

    pub fn immediate_access_threshold(mut self, n: u64) -> Self {
        self.config.immediate_access_threshold = n;
        self
    }

    pub fn frequent_access_interval(mut self, d: Duration) -> Self {
        self.config.frequent_access_interval = d;
        self
    }

    pub fn predictive_window(mut self, d: Duration) -> Self {
        self.config.predictive_window = d;
        self
    }

    pub fn priority(mut self, tuning: PriorityTuning) -> Self {
        self.config.priority = tuning;
        self
    }

    pub fn strategies(mut self, strategies: WarmingStrategyConfig) -> Self {
        self.config.strategies = strategies;
        self
    }

    pub fn build(self) -> WarmerConfig {
        self.config
    }
}

impl Default for WarmerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_target_feeds_are_ordered_maintenance_widest() {
        let strategies = WarmingStrategyConfig::default();
        assert!(strategies.maintenance.target_feeds > strategies.predictive.target_feeds);
        assert!(strategies.predictive.target_feeds > strategies.critical.target_feeds);
    }

    #[test]
    fn builder_overrides_immediate_trigger_knobs() {
        let config = WarmerConfigBuilder::new()
            .immediate_access_threshold(5)
            .frequent_access_interval(Duration::from_secs(2))
            .build();
        assert_eq!(config.immediate_access_threshold, 5);
        assert_eq!(config.frequent_access_interval, Duration::from_secs(2));
    }
}
