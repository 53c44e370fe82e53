//! Per-feed access tracking and priority scoring.

use crate::config::PriorityTuning;
use ftso_market_core::FeedId;
use std::time::{Duration, Instant};

/// Rolling access history for one feed, used to decide whether and how
/// urgently it should be warmed.
#[derive(Debug, Clone)]
pub(crate) struct AccessPattern {
    pub(crate) feed: FeedId,
    pub(crate) access_count: u64,
    pub(crate) first_accessed: Instant,
    pub(crate) last_accessed: Instant,
    /// Exponential moving average of the interval between accesses,
    /// seeded from the first observed gap. Drives predictive warming:
    /// a feed due for its next access soon gets warmed ahead of it.
    pub(crate) average_interval: Option<Duration>,
    /// `last_accessed + average_interval` as of the last recorded access;
    /// the predictive strategy warms a feed once this falls within its
    /// lookahead window (spec §4.2).
    pub(crate) predicted_next_access: Option<Instant>,
    pub(crate) last_warmed: Option<Instant>,
    pub(crate) warming_success: u64,
    pub(crate) warming_failures: u64,
    /// Cached result of the priority formula, recomputed on every access
    /// and every completed warm so `priority_score` is a plain read.
    pub(crate) priority: f64,
    /// Set while an immediate or cycle-driven warm for this feed is in
    /// flight, so a second trigger arriving before the first completes
    /// coalesces into a no-op instead of double-warming (spec §9: "warming
    /// storm" coalescing).
    pub(crate) in_flight: bool,
}

impl AccessPattern {
    pub(crate) fn new(feed: FeedId) -> Self {
        let now = Instant::now();
        Self {
            feed,
            access_count: 0,
            first_accessed: now,
            last_accessed: now,
            average_interval: None,
            predicted_next_access: None,
            last_warmed: None,
            warming_success: 0,
            warming_failures: 0,
            priority: 0.0,
            in_flight: false,
        }
    }

    /// Records an access, returning whether this was the very first one
    /// tracked for the feed (spec §4.2: "on the very first access ... the
    /// warmer must issue an asynchronous warm"). Recomputes the cached
    /// priority score and the predicted-next-access time.
    pub(crate) fn record_access(&mut self, tuning: &PriorityTuning) -> bool {
        let now = Instant::now();
        let first_access = self.access_count == 0;
        let gap = now.duration_since(self.last_accessed);
        self.average_interval = Some(match self.average_interval {
            Some(avg) => Duration::from_secs_f64(avg.as_secs_f64() * 0.7 + gap.as_secs_f64() * 0.3),
            None => gap,
        });
        self.last_accessed = now;
        self.access_count += 1;
        self.predicted_next_access = self.average_interval.map(|avg| now + avg);
        self.priority = self.compute_priority_score(tuning);
        first_access
    }

    pub(crate) fn is_stale(&self, threshold: Duration) -> bool {
        self.last_accessed.elapsed() > threshold
    }

    /// Whether the feed's predicted next access falls within `window` from
    /// now (spec §4.2: `predictedNextAccess - now ∈ (0, window]`).
    pub(crate) fn is_due_soon(&self, window: Duration) -> bool {
        match self.predicted_next_access {
            Some(predicted) => {
                let now = Instant::now();
                predicted > now && predicted.duration_since(now) <= window
            }
            None => false,
        }
    }

    /// Whether a warm was already triggered too recently for this feed,
    /// coalescing an access burst ("warming storm") into a single warm.
    /// A feed currently being warmed also counts, regardless of when its
    /// last completed warm was.
    pub(crate) fn is_warming_storm(&self, min_interval: Duration) -> bool {
        self.in_flight
            || match self.last_warmed {
                Some(t) => t.elapsed() < min_interval,
                None => false,
            }
    }

    /// Atomically checks the warming-storm guard and claims the feed for
    /// warming in one step, so two concurrent callers can't both see "not
    /// in flight" and both dispatch a warm.
    pub(crate) fn try_begin_warm(&mut self, min_interval: Duration) -> bool {
        if self.is_warming_storm(min_interval) {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Records the outcome of a completed warm (spec §4.2's `warmingSuccess`
    /// / `warmingFailures` counters) and recomputes the cached priority,
    /// since the success-rate term depends on them.
    pub(crate) fn mark_warmed(&mut self, success: bool, tuning: &PriorityTuning) {
        self.last_warmed = Some(Instant::now());
        self.in_flight = false;
        if success {
            self.warming_success += 1;
        } else {
            self.warming_failures += 1;
        }
        self.priority = self.compute_priority_score(tuning);
    }

    /// Priority score (spec §4.2): `k0 * log(accessCount+1) * recency *
    /// frequency * success_rate * time_decay * volume_boost`, clamped to
    /// `[priority_min, priority_max]`. Higher means warm sooner.
    ///
    /// `recency` rewards feeds touched in the last 30 minutes over ones
    /// only touched hours ago; `frequency` rewards a tight rolling access
    /// interval; `success_rate` de-prioritizes feeds whose warms keep
    /// failing; `time_decay` lets the score fade for feeds whose access
    /// history is old relative to an adaptive half-life that grows with
    /// how much history the feed has accumulated.
    fn compute_priority_score(&self, tuning: &PriorityTuning) -> f64 {
        let base = tuning.k0 * ((self.access_count as f64) + 1.0).ln();

        let recency_seconds = self.last_accessed.elapsed().as_secs_f64();
        let recency = if recency_seconds < 1_800.0 {
            tuning.recency_30m
        } else if recency_seconds < 7_200.0 {
            tuning.recency_2h
        } else if recency_seconds < 28_800.0 {
            tuning.recency_8h
        } else {
            tuning.recency_default
        };

        let frequency = match self.average_interval {
            Some(avg) if avg < Duration::from_secs(15) => tuning.frequency_15s,
            Some(avg) if avg < Duration::from_secs(60) => tuning.frequency_60s,
            _ => tuning.frequency_default,
        };

        let attempts = self.warming_success + self.warming_failures;
        let success_rate = if attempts == 0 {
            tuning.default_success_rate
        } else {
            self.warming_success as f64 / attempts as f64
        };

        let half_life_hours =
            tuning.base_half_life_hours + tuning.half_life_growth * ((self.access_count as f64) + 1.0).ln();
        let hours_since_first_access = self.first_accessed.elapsed().as_secs_f64() / 3_600.0;
        let time_decay = (-hours_since_first_access / half_life_hours).exp();

        let raw = base * recency * frequency * success_rate * time_decay * tuning.volume_boost_factor;
        raw.clamp(tuning.priority_min, tuning.priority_max)
    }

    /// Cached priority score from the most recent access or warm outcome.
    pub(crate) fn priority_score(&self) -> f64 {
        self.priority
    }
}
