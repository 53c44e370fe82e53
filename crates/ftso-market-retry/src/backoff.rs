//! Backoff interval strategies.

use std::time::Duration;

pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before the next retry attempt (0-indexed: the
    /// first retry is attempt 0).
    fn next_interval(&self, attempt: usize) -> Duration;
}

#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Exponential backoff with full jitter (spec §4.4): each interval is
/// `min(max, initial * multiplier^attempt)`, randomized uniformly in
/// `[interval * (1 - jitter), interval * (1 + jitter)]` to avoid a
/// thundering herd of reconnecting sources all retrying in lockstep.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
            jitter: 0.0,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    /// Jitter factor in `[0.0, 1.0]`; 0.0 means no randomization.
    pub fn jitter(mut self, factor: f64) -> Self {
        self.jitter = factor.clamp(0.0, 1.0);
        self
    }

    fn randomize(&self, duration: Duration) -> Duration {
        if self.jitter == 0.0 {
            return duration;
        }
        use rand::Rng;
        let mut rng = rand::rng();
        let delta = duration.as_secs_f64() * self.jitter;
        let min = (duration.as_secs_f64() - delta).max(0.0);
        let max = duration.as_secs_f64() + delta;
        Duration::from_secs_f64(rng.random_range(min..=max))
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let multiplier = self.multiplier.powi(attempt as i32);
        let interval = self.initial_interval.mul_f64(multiplier);
        let capped = match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        };
        self.randomize(capped)
    }
}
