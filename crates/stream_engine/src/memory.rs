use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use stream_logging::{stream_debug, stream_wire};

use crate::channel::{Channel, Handler, HandlerRegistry, Payload};
use crate::frame::{Frame, CONNECT_EVENT, DISCONNECT_EVENT};
use crate::ConnectionError;

/// In-process channel for tests and offline use.
///
/// Outbound frames are recorded instead of sent; inbound events are injected
/// with [`MemoryChannel::deliver`].
#[derive(Default)]
pub struct MemoryChannel {
    registry: HandlerRegistry,
    sent: Mutex<Vec<Frame>>,
    connected: AtomicBool,
    unreachable: AtomicBool,
    delivery: Mutex<()>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that starts out linked, without raising `connect`.
    pub fn connected() -> Self {
        let channel = Self::default();
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    /// Makes subsequent `connect` calls fail as if the endpoint were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delivers one inbound event. Returns whether a handler ran.
    pub fn deliver(&self, event: &str, payload: Payload) -> bool {
        // Serializes deliveries so handlers never overlap.
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        stream_wire!("<- {} {:?}", event, payload);
        self.registry.dispatch(event, payload)
    }

    /// Simulates an unrequested link loss.
    pub fn drop_link(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.deliver(DISCONNECT_EVENT, None);
        }
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.registry.contains(event)
    }
}

#[async_trait::async_trait]
impl Channel for MemoryChannel {
    async fn connect(&self, endpoint: &str) -> Result<(), ConnectionError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: "memory channel marked unreachable".to_string(),
            });
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            stream_debug!("memory channel linked ({})", endpoint);
            self.deliver(CONNECT_EVENT, None);
        }
        Ok(())
    }

    fn send(&self, event: &str, payload: Payload) -> Result<(), ConnectionError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected);
        }
        stream_wire!("-> {} {:?}", event, payload);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Frame::new(event, payload));
        Ok(())
    }

    fn on(&self, event: &str, handler: Handler) {
        self.registry.insert(event, handler);
    }

    fn off(&self, event: &str) {
        self.registry.remove(event);
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
