//! Lifecycle event system.
//!
//! Watchdogs publish what happens to their connection (channel became active,
//! a reconnect was scheduled, an attempt failed) as typed events. Listeners
//! are plain callbacks registered at configuration time.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a connection watchdog.
pub trait LifecycleEvent: Send + Sync + fmt::Debug {
    /// Short, stable name of the event kind (e.g. `"reconnect_scheduled"`).
    fn event_type(&self) -> &'static str;

    /// When this event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the watchdog instance that emitted this event.
    fn watchdog_name(&self) -> &str;
}

/// Receives lifecycle events.
pub trait EventListener<E: LifecycleEvent>: Send + Sync {
    /// Called for every emitted event, on the emitting task.
    fn on_event(&self, event: &E);
}

/// An ordered set of listeners for one event type.
pub struct EventListeners<E: LifecycleEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: LifecycleEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: LifecycleEvent> EventListeners<E> {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are called in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a listener that is already shared with other sets.
    pub fn add_shared(&mut self, listener: Arc<dyn EventListener<E>>) {
        self.listeners.push(listener);
    }

    /// Delivers `event` to every listener and returns how many of them panicked.
    ///
    /// A panicking listener never stops delivery to the ones after it, and
    /// never unwinds into the watchdog.
    pub fn emit(&self, event: &E) -> usize {
        let mut panicked = 0;
        for listener in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                panicked += 1;
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    watchdog = event.watchdog_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
        panicked
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: LifecycleEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LifecycleEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A listener backed by a closure.
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F> {
    /// Wraps `f` as a listener.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: LifecycleEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
