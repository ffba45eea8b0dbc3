use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use stream_logging::{stream_debug, stream_wire};

use crate::ConnectionError;

/// Event payload; `None` for events that carry no data.
pub type Payload = Option<Value>;

pub type Handler = Arc<dyn Fn(Payload) + Send + Sync>;

/// The single logical connection to the processing service.
///
/// Implementations deliver inbound events to the registered handlers one at a
/// time, in the order they were received.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    /// Establishes the link. A no-op when already connected.
    async fn connect(&self, endpoint: &str) -> Result<(), ConnectionError>;

    /// Enqueues one event. Sends are delivered FIFO; there is no acknowledgment.
    fn send(&self, event: &str, payload: Payload) -> Result<(), ConnectionError>;

    /// Binds `handler` to `event`, replacing any previous binding.
    fn on(&self, event: &str, handler: Handler);

    fn off(&self, event: &str);

    /// Tears the link down without raising `disconnect`.
    async fn close(&self);

    fn is_connected(&self) -> bool;
}

/// One handler per event name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when an existing handler was replaced.
    pub fn insert(&self, event: &str, handler: Handler) -> bool {
        let replaced = self.lock().insert(event.to_string(), handler).is_some();
        if replaced {
            stream_debug!("replaced handler for '{}'", event);
        }
        replaced
    }

    pub fn remove(&self, event: &str) -> bool {
        self.lock().remove(event).is_some()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.lock().contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs the handler bound to `event`, if any. Returns whether one ran.
    pub fn dispatch(&self, event: &str, payload: Payload) -> bool {
        // Clone out so the handler may call on/off without deadlocking.
        let handler = self.lock().get(event).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => {
                stream_wire!("no handler for '{}', dropped", event);
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Handler>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = counter.clone();
        Arc::new(move |_: Payload| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn rebinding_replaces_instead_of_stacking() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        assert!(!registry.insert("item", counting(&first)));
        assert!(registry.insert("item", counting(&second)));
        assert_eq!(registry.len(), 1);

        assert!(registry.dispatch("item", None));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_handler_is_not_invoked() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.insert("done", counting(&counter));

        assert!(registry.remove("done"));
        assert!(!registry.remove("done"));
        assert!(!registry.dispatch("done", None));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn handler_may_rebind_itself() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let inner = registry.clone();
        let replacement = counting(&counter);
        registry.insert(
            "error",
            Arc::new(move |_: Payload| {
                inner.insert("error", replacement.clone());
            }),
        );

        assert!(registry.dispatch("error", None));
        assert!(registry.dispatch("error", None));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
