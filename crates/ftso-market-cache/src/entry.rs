//! The value type stored in the cache: a price quote plus the bookkeeping
//! the store needs for TTL expiry and access-pattern tracking.

use std::time::{Duration, Instant};

/// A price observation for one feed, as produced by the aggregation facade.
#[derive(Debug, Clone)]
pub struct MarketDataEntry {
    pub price: f64,
    pub timestamp: Instant,
    pub sources: Vec<String>,
    pub confidence: f64,
    /// Set when the entry was written for a specific voting round rather
    /// than the live "current value" keyspace.
    pub voting_round: Option<u64>,
}

impl MarketDataEntry {
    pub fn new(price: f64, sources: Vec<String>, confidence: f64) -> Self {
        Self {
            price,
            timestamp: Instant::now(),
            sources,
            confidence,
            voting_round: None,
        }
    }

    pub fn for_voting_round(mut self, round: u64) -> Self {
        self.voting_round = Some(round);
        self
    }
}

/// Internal wrapper tracking TTL and access stats for one stored entry.
///
/// `expires_at` is computed once at insertion time from that insertion's
/// own clamped TTL (spec §4.1: "effective TTL for any insertion is
/// `min(requestedTTL, maxTTL)`"), not a single TTL shared by the whole
/// store — the voting-round keyspace and the current-price keyspace are
/// written with different effective TTLs from the same cache instance.
#[derive(Debug, Clone)]
pub(crate) struct CacheItem {
    pub(crate) entry: MarketDataEntry,
    pub(crate) inserted_at: Instant,
    pub(crate) expires_at: Instant,
    pub(crate) last_accessed: Instant,
    pub(crate) access_count: u64,
}

impl CacheItem {
    pub(crate) fn new(entry: MarketDataEntry, effective_ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            entry,
            inserted_at: now,
            expires_at: now + effective_ttl,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub(crate) fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}
