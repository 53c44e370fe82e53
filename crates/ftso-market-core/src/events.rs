//! Process-wide event bus.
//!
//! Design note §9 calls for components to "publish and subscribe by name,
//! never hold live references to each other" so that the tiered error
//! handler, circuit breaker, and failover component can react to each
//! other's state changes without a cyclic `Arc` graph. Each component
//! defines its own event enum (`CircuitBreakerEvent`, `RetryEvent`, ...)
//! and emits it on an `EventBus<E>` it was handed at construction; anyone
//! holding a clone of that same bus can subscribe.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// An event emitted by a market-data component.
pub trait MarketEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable event type, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> Instant;
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A cloneable, shared collection of listeners for one event type.
///
/// Cloning an `EventBus` yields a handle to the same underlying listener
/// list, so the publisher and every subscriber can hold independent clones.
pub struct EventBus<E: MarketEvent> {
    listeners: Arc<RwLock<Vec<Listener<E>>>>,
}

impl<E: MarketEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<E: MarketEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MarketEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Subscribes a closure to every event published on this bus.
    pub fn subscribe<F>(&self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.write().unwrap().push(Arc::new(f));
    }

    /// Publishes an event to every current subscriber.
    ///
    /// A panicking subscriber is caught and logged (when the `tracing`
    /// feature is enabled) so one misbehaving listener can't prevent others
    /// from observing the event.
    pub fn publish(&self, event: &E) {
        let listeners = self.listeners.read().unwrap().clone();
        for listener in listeners.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(event);
            }));
            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(event_type = event.event_type(), "event subscriber panicked");
                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "market_event_subscriber_panics_total",
                    "event_type" => event.event_type()
                )
                .increment(1);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }
}
