//! Internal keyed store combining an eviction policy with TTL expiry.

use crate::entry::CacheItem;
use crate::eviction::{EvictionPolicy, EvictionStore, FifoStore, LfuStore, LruStore};
use crate::stats::StatsCounters;

/// Estimated per-entry overhead used for the memory-limit soft cap. The
/// actual `MarketDataEntry` is small (a float, a timestamp, a handful of
/// short strings); this is a conservative flat estimate rather than a
/// precise accounting, since the cache never owns the allocator.
const ESTIMATED_BYTES_PER_ENTRY: usize = 256;

pub(crate) struct Store {
    inner: Box<dyn EvictionStore<String, CacheItem>>,
    memory_limit_bytes: Option<usize>,
}

impl Store {
    pub(crate) fn new(capacity: usize, policy: EvictionPolicy, memory_limit_bytes: Option<usize>) -> Self {
        let inner: Box<dyn EvictionStore<String, CacheItem>> = match policy {
            EvictionPolicy::Lru => Box::new(LruStore::new(capacity.max(1))),
            EvictionPolicy::Lfu => Box::new(LfuStore::new(capacity.max(1))),
            EvictionPolicy::Fifo => Box::new(FifoStore::new(capacity.max(1))),
        };
        Self {
            inner,
            memory_limit_bytes,
        }
    }

    /// Returns `Some(item)` cloned out if present and not expired, bumping
    /// its access bookkeeping. Returns `None` and silently drops the entry
    /// if it had expired.
    pub(crate) fn get(&mut self, key: &str) -> Option<CacheItem> {
        let expired = match self.inner.peek(&key.to_string()) {
            Some(item) => item.is_expired(),
            None => return None,
        };

        if expired {
            self.inner.remove(&key.to_string());
            return None;
        }

        let item = self.inner.get_mut(&key.to_string())?;
        item.touch();
        Some(item.clone())
    }

    pub(crate) fn peek(&self, key: &str) -> Option<&CacheItem> {
        self.inner.peek(&key.to_string())
    }

    /// Inserts an entry, returning the evicted item (if capacity forced one
    /// out) so the caller can publish an eviction event and update stats.
    pub(crate) fn insert(&mut self, key: String, item: CacheItem) -> Option<CacheItem> {
        self.inner.insert(key, item).map(|(_, v)| v)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<CacheItem> {
        self.inner.remove(&key.to_string())
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }

    pub(crate) fn estimated_memory_usage(&self) -> usize {
        self.inner.len() * ESTIMATED_BYTES_PER_ENTRY
    }

    pub(crate) fn is_over_memory_limit(&self) -> bool {
        match self.memory_limit_bytes {
            Some(limit) => self.estimated_memory_usage() > limit,
            None => false,
        }
    }

    /// Removes every entry whose TTL has elapsed, returning the removed
    /// keys so the sweeper can publish `Expired` events and bump eviction
    /// stats. Invoked by the 500ms background sweep task.
    ///
    /// Sweeping is advisory (spec §4.1): it runs on its own interval and is
    /// eventually consistent with the read path, which always re-checks
    /// expiry itself regardless of whether a sweep has run yet.
    pub(crate) fn sweep_expired(&mut self, counters: &StatsCounters) -> Vec<String> {
        let expired_keys: Vec<String> = self
            .inner
            .keys()
            .into_iter()
            .filter(|k| self.inner.peek(k).map(|item| item.is_expired()).unwrap_or(false))
            .collect();

        for key in &expired_keys {
            self.inner.remove(key);
            counters.record_eviction();
        }
        expired_keys
    }

    /// Removes every stored key ending in `suffix`, returning the removed
    /// keys. Backs [`crate::RealtimeCache::invalidate_on_price_update`],
    /// which must clear only the voting-round keys for a feed
    /// (`voting:{round}:{category}:{name}`-style suffix match) and leave
    /// the current-price key untouched (spec §4.1).
    pub(crate) fn remove_matching(&mut self, matches: impl Fn(&str) -> bool) -> Vec<String> {
        let matched: Vec<String> = self.inner.keys().into_iter().filter(|k| matches(k)).collect();
        for key in &matched {
            self.inner.remove(key);
        }
        matched
    }
}
