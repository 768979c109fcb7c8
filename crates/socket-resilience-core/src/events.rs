//! Event system for socket lifecycle notifications.
//!
//! Events are dispatched through an [`EventRegistry`], which holds at most one
//! handler per event type. Registering a second handler for a type replaces the
//! first. Consumers own a single subscription per event type; fan-out, if
//! needed, belongs inside that one handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Trait for events emitted by a supervised socket.
pub trait Event: Send + Sync + fmt::Debug {
    /// Returns the type name of the event (e.g., "open", "close").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;
}

/// Type alias for a shared event handler.
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Maps an event type name to zero or one handler.
///
/// Cloning the registry yields another view onto the same handler table.
///
/// # Examples
///
/// ```
/// use socket_resilience_core::EventRegistry;
///
/// let registry: EventRegistry<String> = EventRegistry::new();
/// registry.register("greeting", |s: &String| println!("got {}", s));
/// assert!(registry.dispatch("greeting", &"hello".to_string()));
///
/// // Replaces the previous handler.
/// registry.register("greeting", |_: &String| {});
/// assert_eq!(registry.len(), 1);
/// ```
pub struct EventRegistry<E> {
    handlers: Arc<Mutex<HashMap<String, EventHandler<E>>>>,
}

impl<E> EventRegistry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, EventHandler<E>>> {
        // Handlers never run under this lock, so poisoning can only come from
        // a panic inside HashMap itself; the table is still consistent.
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers `handler` for `event_type`, replacing any existing handler.
    ///
    /// An empty `event_type` is ignored.
    pub fn register<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register_handler(event_type, Arc::new(handler));
    }

    /// Registers an already shared handler for `event_type`.
    ///
    /// An empty `event_type` is ignored.
    pub fn register_handler(&self, event_type: &str, handler: EventHandler<E>) {
        if event_type.is_empty() {
            return;
        }
        self.table().insert(event_type.to_string(), handler);
    }

    /// Removes the handler for `event_type`, if any.
    pub fn unregister(&self, event_type: &str) {
        if event_type.is_empty() {
            return;
        }
        self.table().remove(event_type);
    }

    /// Invokes the handler registered for `event_type` with `data`.
    ///
    /// Returns `true` if a handler ran. A missing handler or an empty type is
    /// not an error. A panicking handler is contained and reported as not
    /// having run.
    pub fn dispatch(&self, event_type: &str, data: &E) -> bool {
        if event_type.is_empty() {
            return false;
        }

        // Clone the handler out so it runs without the table lock held; it may
        // re-enter the registry.
        let handler = match self.table().get(event_type) {
            Some(handler) => Arc::clone(handler),
            None => return false,
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(data)));

        #[cfg(feature = "tracing")]
        if outcome.is_err() {
            tracing::error!(event_type, "event handler panicked");
        }

        outcome.is_ok()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.table().clear();
    }

    /// Returns true if a handler is registered for `event_type`.
    pub fn contains(&self, event_type: &str) -> bool {
        self.table().contains_key(event_type)
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if there are no handlers.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

impl<E: Event> EventRegistry<E> {
    /// Dispatches `event` under its own type name.
    pub fn emit(&self, event: &E) -> bool {
        self.dispatch(event.event_type(), event)
    }
}

impl<E> Clone for EventRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<String> = self.table().keys().cloned().collect();
        types.sort();
        f.debug_struct("EventRegistry")
            .field("event_types", &types)
            .finish()
    }
}
