//! Cache statistics snapshot, exposed through the metrics HTTP surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters accumulated as the cache is used.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    total_response_time_micros: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_hit(&self, elapsed: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self, elapsed: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, total_entries: usize, memory_usage_bytes: usize) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let total_micros = self.total_response_time_micros.load(Ordering::Relaxed);

        let (hit_rate, miss_rate, average_response_time) = if total_requests > 0 {
            (
                hits as f64 / total_requests as f64,
                misses as f64 / total_requests as f64,
                Duration::from_micros(total_micros / total_requests),
            )
        } else {
            (0.0, 0.0, Duration::ZERO)
        };

        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            total_requests,
            total_entries,
            hit_rate,
            miss_rate,
            memory_usage_bytes,
            average_response_time,
        }
    }
}

/// Point-in-time cache health snapshot (spec §6 metrics surface).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub total_entries: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub memory_usage_bytes: usize,
    pub average_response_time: Duration,
}
