//! Response-strategy selection (spec §4.5).

use ftso_market_core::{ClassifiedError, ErrorSeverity, SourceTier};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationLevel {
    Severe,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseStrategy {
    /// Schedule a deferred attempt via the circuit breaker / retry executor.
    Retry { estimated_recovery_time: Duration },
    /// Delegate to the connection-recovery component: swap to another
    /// healthy source in the same tier.
    Failover,
    /// Fall from a Tier 1 source to a Tier 2 source for the same feed.
    TierFallback,
    /// Substitute the CCXT-backed adapter for the same exchange.
    CcxtBackup,
    /// Last resort: report degraded service.
    GracefulDegradation { level: DegradationLevel },
}

/// Availability of each non-retry strategy for a given (source, feed) pair,
/// supplied by the caller from the failover component's registry state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyContext {
    pub other_healthy_same_tier: bool,
    pub tier2_available_for_feed: bool,
    pub ccxt_backup_available_for_exchange: bool,
}

/// Picks a response strategy for a classified error, per the priority order
/// and selection rule in spec §4.5: retry > failover > tier_fallback >
/// ccxt_backup > graceful_degradation, with critical-severity errors
/// preferring any available failover-family strategy over retry.
pub fn select_strategy(
    error: &ClassifiedError,
    ctx: &StrategyContext,
    estimated_recovery_time: Duration,
) -> ResponseStrategy {
    let mut candidates = Vec::with_capacity(5);

    if error.recoverable {
        candidates.push(ResponseStrategy::Retry {
            estimated_recovery_time,
        });
    }
    if ctx.other_healthy_same_tier {
        candidates.push(ResponseStrategy::Failover);
    }
    if error.tier == SourceTier::Tier1 && ctx.tier2_available_for_feed {
        candidates.push(ResponseStrategy::TierFallback);
    }
    if error.tier == SourceTier::Tier1 && ctx.ccxt_backup_available_for_exchange {
        candidates.push(ResponseStrategy::CcxtBackup);
    }
    candidates.push(ResponseStrategy::GracefulDegradation {
        level: DegradationLevel::Severe,
    });

    if error.severity == ErrorSeverity::Critical {
        if let Some(pos) = candidates.iter().position(|s| matches!(s, ResponseStrategy::Failover)) {
            return candidates.swap_remove(pos);
        }
    }

    if error.recoverable && error.severity != ErrorSeverity::Critical {
        if let Some(pos) = candidates.iter().position(|s| matches!(s, ResponseStrategy::Retry { .. })) {
            return candidates.swap_remove(pos);
        }
    }

    // Highest-ranked available strategy: `candidates` was built in priority
    // order (retry, failover, tier_fallback, ccxt_backup, graceful_degradation).
    candidates.into_iter().next().expect("graceful_degradation is always a candidate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftso_market_core::ClassifiedError;

    fn error(recoverable_message: &str, severity_errors: usize) -> ClassifiedError {
        ClassifiedError::classify("binance-adapter", recoverable_message, None, None, severity_errors)
    }

    #[test]
    fn recoverable_non_critical_prefers_retry() {
        let e = error("connection reset", 0);
        let ctx = StrategyContext {
            other_healthy_same_tier: true,
            ..Default::default()
        };
        let strategy = select_strategy(&e, &ctx, Duration::from_millis(100));
        assert!(matches!(strategy, ResponseStrategy::Retry { .. }));
    }

    #[test]
    fn critical_severity_prefers_failover_over_retry() {
        let e = error("connection reset", 5);
        let ctx = StrategyContext {
            other_healthy_same_tier: true,
            ..Default::default()
        };
        let strategy = select_strategy(&e, &ctx, Duration::from_millis(100));
        assert_eq!(strategy, ResponseStrategy::Failover);
    }

    #[test]
    fn non_recoverable_without_failover_falls_to_graceful_degradation() {
        let e = error("unauthorized: bad token", 0);
        let ctx = StrategyContext::default();
        let strategy = select_strategy(&e, &ctx, Duration::from_millis(100));
        assert_eq!(
            strategy,
            ResponseStrategy::GracefulDegradation {
                level: DegradationLevel::Severe
            }
        );
    }

    #[test]
    fn non_recoverable_error_falls_back_to_ccxt_backup_when_available() {
        let e = error("unauthorized: invalid credentials", 0);
        let ctx = StrategyContext {
            ccxt_backup_available_for_exchange: true,
            ..Default::default()
        };
        let strategy = select_strategy(&e, &ctx, Duration::from_millis(100));
        assert_eq!(strategy, ResponseStrategy::CcxtBackup);
    }
}
