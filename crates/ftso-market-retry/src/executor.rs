//! Generic retry executor with exponential backoff, jitter, and an
//! optional circuit breaker guard in front of every attempt.

use crate::classifier::RetryClassifier;
use crate::config::RetryConfig;
use crate::error::RetryError;
use crate::events::RetryEvent;
use ftso_market_circuitbreaker::CircuitBreakerRegistry;
use ftso_market_core::EventBus;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub total_retries: u64,
    pub total_exhausted: u64,
    pub total_succeeded: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    retries: AtomicU64,
    exhausted: AtomicU64,
    succeeded: AtomicU64,
}

/// Runs an operation with retries, consulting a circuit breaker registry
/// (if attached) before every attempt so a tripped circuit fails fast
/// instead of burning through the retry budget.
pub struct RetryExecutor {
    events: EventBus<RetryEvent>,
    circuit_breakers: Option<Arc<CircuitBreakerRegistry>>,
    counters: Counters,
    /// Service-wide shutdown flag (spec §4.4(b), §5): once set, any retry
    /// loop in progress aborts at its next attempt boundary instead of
    /// sleeping out the remaining backoff and retrying.
    shutdown: Arc<AtomicBool>,
}

/// Whichever one of {success, classified failure, timeout} an attempt
/// produced, before the retry/exhaustion decision is applied to it.
enum AttemptOutcome<T, E> {
    Success(T),
    Failed(E),
    TimedOut,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self {
            events: EventBus::new(),
            circuit_breakers: None,
            counters: Counters::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_circuit_breakers(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.circuit_breakers = Some(registry);
        self
    }

    pub fn event_bus(&self) -> EventBus<RetryEvent> {
        self.events.clone()
    }

    /// Aborts every retry loop currently in progress on this executor at
    /// its next attempt boundary, and every call to `execute_with_retry`
    /// made afterwards (spec §4.4(b), §5's service-wide shutdown flag).
    pub fn trigger_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            total_attempts: self.counters.attempts.load(Ordering::Relaxed),
            total_retries: self.counters.retries.load(Ordering::Relaxed),
            total_exhausted: self.counters.exhausted.load(Ordering::Relaxed),
            total_succeeded: self.counters.succeeded.load(Ordering::Relaxed),
        }
    }

    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        service_id: &str,
        config: &RetryConfig,
        classifier: &dyn RetryClassifier<E>,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0usize;
        loop {
            if self.is_shutting_down() {
                return Err(RetryError::ShuttingDown);
            }

            if let Some(registry) = &self.circuit_breakers {
                registry.try_acquire(service_id)?;
            }

            self.counters.attempts.fetch_add(1, Ordering::Relaxed);

            // spec §3/§4.3: every breaker-wrapped operation runs under an
            // `operationTimeout`, and an elapsed deadline counts as a
            // failure. With no circuit breaker attached there is no
            // per-service timeout to enforce, so the call runs untimed.
            let operation_timeout = self.circuit_breakers.as_ref().map(|r| r.operation_timeout(service_id));
            let outcome = match operation_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, operation()).await {
                    Ok(Ok(value)) => AttemptOutcome::Success(value),
                    Ok(Err(error)) => AttemptOutcome::Failed(error),
                    Err(_elapsed) => AttemptOutcome::TimedOut,
                },
                None => match operation().await {
                    Ok(value) => AttemptOutcome::Success(value),
                    Err(error) => AttemptOutcome::Failed(error),
                },
            };

            match outcome {
                AttemptOutcome::Success(value) => {
                    if let Some(registry) = &self.circuit_breakers {
                        registry.record_success(service_id);
                    }
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    self.events.publish(&RetryEvent::Succeeded {
                        service_id: service_id.to_string(),
                        attempt,
                        timestamp: Instant::now(),
                    });
                    return Ok(value);
                }
                AttemptOutcome::Failed(error) => {
                    if let Some(registry) = &self.circuit_breakers {
                        registry.record_failure(service_id);
                    }
                    self.events.publish(&RetryEvent::AttemptFailed {
                        service_id: service_id.to_string(),
                        attempt,
                        timestamp: Instant::now(),
                    });

                    let retryable = classifier.is_retryable(&error);
                    attempt += 1;

                    if !retryable || attempt >= config.max_attempts {
                        self.counters.exhausted.fetch_add(1, Ordering::Relaxed);
                        self.events.publish(&RetryEvent::AttemptsExhausted {
                            service_id: service_id.to_string(),
                            attempts: attempt,
                            timestamp: Instant::now(),
                        });
                        return Err(RetryError::ExhaustedAttempts {
                            attempts: attempt,
                            source: error,
                        });
                    }

                    let delay = config.backoff.next_interval(attempt - 1);
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    self.events.publish(&RetryEvent::RetryScheduled {
                        service_id: service_id.to_string(),
                        attempt,
                        delay,
                        timestamp: Instant::now(),
                    });
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::TimedOut => {
                    if let Some(registry) = &self.circuit_breakers {
                        registry.record_failure(service_id);
                    }
                    self.events.publish(&RetryEvent::AttemptFailed {
                        service_id: service_id.to_string(),
                        attempt,
                        timestamp: Instant::now(),
                    });

                    // A timed-out attempt is always treated as retryable —
                    // every classifier's default retryable set already
                    // includes "timeout" (spec §4.4), so there is no
                    // classification to defer to here.
                    attempt += 1;

                    if attempt >= config.max_attempts {
                        self.counters.exhausted.fetch_add(1, Ordering::Relaxed);
                        self.events.publish(&RetryEvent::AttemptsExhausted {
                            service_id: service_id.to_string(),
                            attempts: attempt,
                            timestamp: Instant::now(),
                        });
                        return Err(RetryError::TimedOut { attempts: attempt });
                    }

                    let delay = config.backoff.next_interval(attempt - 1);
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    self.events.publish(&RetryEvent::RetryScheduled {
                        service_id: service_id.to_string(),
                        attempt,
                        delay,
                        timestamp: Instant::now(),
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PredicateClassifier;
    use ftso_market_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let executor = RetryExecutor::new();
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || async { Ok::<_, &str>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(executor.stats().total_retries, 0);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let executor = RetryExecutor::new();
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(executor.stats().total_retries, 1);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let executor = RetryExecutor::new();
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| false);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || async { Err::<i32, _>("fatal") })
            .await;

        assert!(result.is_err());
        assert_eq!(executor.stats().total_retries, 0);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let executor = RetryExecutor::new();
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || async { Err::<i32, _>("always fails") })
            .await;

        match result {
            Err(RetryError::ExhaustedAttempts { attempts, .. }) => {
                assert_eq!(attempts, config.max_attempts);
            }
            _ => panic!("expected exhausted attempts error"),
        }
    }

    #[tokio::test]
    async fn slow_operation_times_out_and_counts_as_a_failure() {
        let registry = Arc::new(CircuitBreakerRegistry::new(
            CircuitBreakerConfig::new("default").operation_timeout(Duration::from_millis(10)),
        ));
        let executor = RetryExecutor::new().with_circuit_breakers(Arc::clone(&registry));
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, &str>(42)
            })
            .await;

        match result {
            Err(RetryError::TimedOut { attempts }) => {
                assert_eq!(attempts, config.max_attempts);
            }
            _ => panic!("expected timed-out error"),
        }
        assert_eq!(executor.stats().total_exhausted, 1);
    }

    #[tokio::test]
    async fn shutdown_flag_aborts_before_the_first_attempt() {
        let executor = RetryExecutor::new();
        executor.trigger_shutdown();
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || async { Ok::<_, &str>(1) })
            .await;

        assert!(matches!(result, Err(RetryError::ShuttingDown)));
    }

    #[tokio::test]
    async fn shutdown_triggered_mid_retry_aborts_the_next_attempt() {
        let executor = RetryExecutor::new();
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    executor.trigger_shutdown();
                }
                async move {
                    if n == 0 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::ShuttingDown)));
    }

    #[tokio::test]
    async fn fast_operation_is_unaffected_by_a_generous_timeout() {
        let registry = Arc::new(CircuitBreakerRegistry::new(
            CircuitBreakerConfig::new("default").operation_timeout(Duration::from_secs(5)),
        ));
        let executor = RetryExecutor::new().with_circuit_breakers(registry);
        let config = RetryConfig::cache("test");
        let classifier = PredicateClassifier::new(|_: &&str| true);

        let result = executor
            .execute_with_retry("svc", &config, &classifier, || async { Ok::<_, &str>(7) })
            .await;

        assert_eq!(result.unwrap(), 7);
    }
}
