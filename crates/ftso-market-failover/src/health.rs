//! Per-source connection health tracking.

use ftso_market_core::SourceTier;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

impl ConnectionState {
    fn encode(self) -> u64 {
        match self {
            ConnectionState::Connected => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::Reconnecting => 2,
        }
    }

    fn decode(value: u64) -> Self {
        match value {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Disconnected,
            _ => ConnectionState::Reconnecting,
        }
    }
}

/// Lock-free health tracker for one data source, shared between the
/// orchestrator (which drives reconnection) and the recovery component
/// (which reads it to decide whether to fail over).
#[derive(Clone)]
pub struct SourceHealth {
    pub source_id: String,
    pub tier: SourceTier,
    state: Arc<AtomicU64>,
    consecutive_failures: Arc<AtomicU32>,
    reconnect_attempts: Arc<AtomicU32>,
    last_connected_millis: Arc<AtomicU64>,
    last_error: Arc<std::sync::Mutex<Option<String>>>,
    created_at: Instant,
}

impl SourceHealth {
    pub fn new(source_id: impl Into<String>, tier: SourceTier) -> Self {
        Self {
            source_id: source_id.into(),
            tier,
            state: Arc::new(AtomicU64::new(ConnectionState::Disconnected.encode())),
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            reconnect_attempts: Arc::new(AtomicU32::new(0)),
            last_connected_millis: Arc::new(AtomicU64::new(0)),
            last_error: Arc::new(std::sync::Mutex::new(None)),
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::decode(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A source is healthy once connected with no consecutive failures
    /// recorded since the last successful reconnect.
    pub fn is_healthy(&self) -> bool {
        self.is_connected() && self.consecutive_failures.load(Ordering::Acquire) == 0
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    pub fn mark_connected(&self) {
        self.state.store(ConnectionState::Connected.encode(), Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
        self.reconnect_attempts.store(0, Ordering::Release);
        self.last_connected_millis
            .store(self.created_at.elapsed().as_millis() as u64, Ordering::Release);
    }

    pub fn mark_disconnected(&self, error: impl Into<String>) {
        self.state.store(ConnectionState::Disconnected.encode(), Ordering::Release);
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
        *self.last_error.lock().unwrap() = Some(error.into());
    }

    pub fn mark_reconnecting(&self) {
        self.state.store(ConnectionState::Reconnecting.encode(), Ordering::Release);
        self.reconnect_attempts.fetch_add(1, Ordering::AcqRel);
    }

    pub fn time_since_connected(&self) -> Option<Duration> {
        let last = self.last_connected_millis.load(Ordering::Acquire);
        if last == 0 {
            None
        } else {
            let now_millis = self.created_at.elapsed().as_millis() as u64;
            Some(Duration::from_millis(now_millis.saturating_sub(last)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_and_unhealthy() {
        let health = SourceHealth::new("binance", SourceTier::Tier1);
        assert_eq!(health.state(), ConnectionState::Disconnected);
        assert!(!health.is_healthy());
    }

    #[test]
    fn connecting_resets_failure_counters() {
        let health = SourceHealth::new("binance", SourceTier::Tier1);
        health.mark_disconnected("boom");
        health.mark_disconnected("boom again");
        assert_eq!(health.consecutive_failures(), 2);

        health.mark_connected();
        assert!(health.is_healthy());
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[test]
    fn reconnecting_counts_attempts() {
        let health = SourceHealth::new("binance", SourceTier::Tier1);
        health.mark_reconnecting();
        health.mark_reconnecting();
        assert_eq!(health.reconnect_attempts(), 2);
        assert_eq!(health.state(), ConnectionState::Reconnecting);
    }
}
