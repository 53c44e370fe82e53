//! Decides whether a failed call is worth retrying.

use ftso_market_core::ErrorClassification;
use std::sync::Arc;

/// A classifier decides retryability from a [`ErrorClassification`]. The
/// default heuristic retries everything recoverable per spec §4.5 except
/// rate-limit errors, which the retry executor's backoff already handles
/// more conservatively via a longer initial interval at the call site.
pub trait RetryClassifier<E>: Send + Sync {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Classifies by the shared [`ErrorClassification`] taxonomy: connection,
/// timeout, rate-limit, and exchange errors are retried; validation,
/// authentication, and parsing errors are not.
pub struct DefaultClassifier;

impl RetryClassifier<ErrorClassification> for DefaultClassifier {
    fn is_retryable(&self, error: &ErrorClassification) -> bool {
        matches!(
            error,
            ErrorClassification::Connection
                | ErrorClassification::Timeout
                | ErrorClassification::RateLimit
                | ErrorClassification::Exchange
                | ErrorClassification::StaleData
        )
    }
}

/// A predicate-backed classifier for services that need a custom rule
/// instead of the default taxonomy mapping.
pub struct PredicateClassifier<E> {
    predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> PredicateClassifier<E> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl<E> RetryClassifier<E> for PredicateClassifier<E> {
    fn is_retryable(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_classifier_retries_connection_errors() {
        let classifier = DefaultClassifier;
        assert!(classifier.is_retryable(&ErrorClassification::Connection));
    }

    #[test]
    fn default_classifier_does_not_retry_authentication_errors() {
        let classifier = DefaultClassifier;
        assert!(!classifier.is_retryable(&ErrorClassification::Authentication));
    }

    #[test]
    fn predicate_classifier_uses_custom_rule() {
        let classifier = PredicateClassifier::new(|e: &u8| *e == 1);
        assert!(classifier.is_retryable(&1));
        assert!(!classifier.is_retryable(&2));
    }
}
