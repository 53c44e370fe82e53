//! Lightweight health probe used by the recovery monitor.

use futures::future::BoxFuture;

/// A breaker-protected health check for one data source, supplied by the
/// orchestrator at startup. The recovery monitor calls this on unhealthy
/// sources every sweep; a `true` result marks the source recovered.
pub trait HealthProbe: Send + Sync {
    fn probe<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, bool>;
}

impl<F> HealthProbe for F
where
    F: for<'a> Fn(&'a str) -> BoxFuture<'a, bool> + Send + Sync,
{
    fn probe<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, bool> {
        self(source_id)
    }
}
