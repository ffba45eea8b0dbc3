use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use stream_logging::{stream_debug, stream_info, stream_warn, stream_wire};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::channel::{Channel, Handler, HandlerRegistry, Payload};
use crate::frame::{Frame, CONNECT_EVENT, DISCONNECT_EVENT};
use crate::{ChannelSettings, ConnectionError};

/// WebSocket implementation of [`Channel`], one JSON text frame per event.
pub struct WsChannel {
    settings: ChannelSettings,
    registry: HandlerRegistry,
    link: Mutex<Option<Link>>,
    connecting: tokio::sync::Mutex<()>,
}

struct Link {
    endpoint: String,
    outbound: mpsc::UnboundedSender<Frame>,
    alive: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsChannel {
    pub fn new(settings: ChannelSettings) -> Self {
        Self {
            settings,
            registry: HandlerRegistry::new(),
            link: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WsChannel {
    fn default() -> Self {
        Self::new(ChannelSettings::default())
    }
}

#[async_trait::async_trait]
impl Channel for WsChannel {
    async fn connect(&self, endpoint: &str) -> Result<(), ConnectionError> {
        let _connecting = self.connecting.lock().await;
        if let Some(link) = self.link().as_ref() {
            if link.alive.load(Ordering::SeqCst) {
                if link.endpoint != endpoint {
                    stream_warn!(
                        "already connected to {}; ignoring connect to {}",
                        link.endpoint,
                        endpoint
                    );
                }
                return Ok(());
            }
        }

        validate_endpoint(endpoint)?;
        let timeout = self.settings.connect_timeout;
        let (stream, _response) = tokio::time::timeout(timeout, connect_async(endpoint))
            .await
            .map_err(|_| ConnectionError::Timeout {
                endpoint: endpoint.to_string(),
                timeout,
            })?
            .map_err(|err| ConnectionError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            })?;
        stream_info!("connected to {}", endpoint);

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let alive = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(AtomicBool::new(false));

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(err) => {
                        stream_warn!("dropping unencodable '{}' frame: {}", frame.event, err);
                        continue;
                    }
                };
                stream_wire!("-> {}", text);
                if sink.send(Message::Text(text)).await.is_err() {
                    stream_debug!("websocket send failed; writer stopping");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let registry = self.registry.clone();
        let reader_alive = alive.clone();
        let reader_closing = closing.clone();
        let (start_tx, start_rx) = oneshot::channel::<()>();
        let reader = tokio::spawn(async move {
            // Held back until `connect` has been raised.
            let _ = start_rx.await;
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            stream_warn!("dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        stream_debug!("server sent close frame");
                        break;
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        stream_warn!("websocket error: {}", err);
                        break;
                    }
                };
                stream_wire!("<- {}", text);
                match Frame::decode(&text) {
                    Ok(frame) if is_link_event(&frame.event) => {
                        stream_warn!("ignoring '{}' frame from the peer", frame.event);
                    }
                    Ok(frame) => {
                        registry.dispatch(&frame.event, frame.data);
                    }
                    Err(err) => stream_warn!("{}", err),
                }
            }

            reader_alive.store(false, Ordering::SeqCst);
            if !reader_closing.load(Ordering::SeqCst) {
                stream_warn!("connection lost");
                registry.dispatch(DISCONNECT_EVENT, None);
            }
        });

        let previous = self.link().replace(Link {
            endpoint: endpoint.to_string(),
            outbound,
            alive,
            closing,
            reader,
            writer,
        });
        if let Some(previous) = previous {
            previous.reader.abort();
            previous.writer.abort();
        }

        // The link is in place, so handlers reacting to `connect` can send.
        self.registry.dispatch(CONNECT_EVENT, None);
        let _ = start_tx.send(());
        Ok(())
    }

    fn send(&self, event: &str, payload: Payload) -> Result<(), ConnectionError> {
        let guard = self.link();
        let link = guard
            .as_ref()
            .filter(|link| link.alive.load(Ordering::SeqCst))
            .ok_or(ConnectionError::NotConnected)?;
        link.outbound
            .send(Frame::new(event, payload))
            .map_err(|_| ConnectionError::NotConnected)
    }

    fn on(&self, event: &str, handler: Handler) {
        self.registry.insert(event, handler);
    }

    fn off(&self, event: &str) {
        self.registry.remove(event);
    }

    async fn close(&self) {
        let link = self.link().take();
        let Some(link) = link else {
            return;
        };
        link.closing.store(true, Ordering::SeqCst);
        link.alive.store(false, Ordering::SeqCst);
        // Dropping the sender lets the writer flush queued frames and send Close.
        drop(link.outbound);
        let _ = link.writer.await;
        link.reader.abort();
        let _ = link.reader.await;
        stream_info!("closed connection to {}", link.endpoint);
    }

    fn is_connected(&self) -> bool {
        self.link()
            .as_ref()
            .map(|link| link.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if let Some(link) = self.link().take() {
            link.closing.store(true, Ordering::SeqCst);
            link.reader.abort();
            link.writer.abort();
        }
    }
}

/// Names the transport raises itself; a peer cannot fake them.
fn is_link_event(event: &str) -> bool {
    event == CONNECT_EVENT || event == DISCONNECT_EVENT
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConnectionError> {
    let invalid = |reason: &str| ConnectionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let parsed = url::Url::parse(endpoint).map_err(|err| invalid(&err.to_string()))?;
    match parsed.scheme() {
        "ws" => Ok(()),
        "wss" => Err(invalid("TLS endpoints are not supported by this build")),
        _ => Err(invalid("scheme must be ws")),
    }
}
