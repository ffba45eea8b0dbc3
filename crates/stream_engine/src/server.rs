use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use stream_logging::{stream_debug, stream_info, stream_warn, stream_wire};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::frame::{
    DonePayload, ErrorPayload, Frame, ItemPayload, StartProcessing, DONE_EVENT, ERROR_EVENT,
    ITEM_EVENT, START_PROCESSING_EVENT,
};

const EMPTY_TEXT_MESSAGE: &str = "Empty text";
const COMPLETE_MESSAGE: &str = "Processing complete";

pub trait ItemSink: Send + Sync {
    fn emit(&self, value: Value);
}

/// Turns one job's text into a stream of items.
#[async_trait::async_trait]
pub trait Processor: Send + Sync {
    /// Emits items through `sink`; an `Err` is reported to the client as `error`.
    async fn process(&self, text: &str, sink: &dyn ItemSink) -> Result<(), String>;
}

/// Demo processor: each whitespace-separated word, reversed and upper-cased.
#[derive(Debug, Clone, Default)]
pub struct ReverseWords {
    /// Pause before each emitted item.
    item_delay: Duration,
}

impl ReverseWords {
    pub fn new(item_delay: Duration) -> Self {
        Self { item_delay }
    }

    pub fn transform(word: &str) -> String {
        word.chars().rev().collect::<String>().to_uppercase()
    }
}

#[async_trait::async_trait]
impl Processor for ReverseWords {
    async fn process(&self, text: &str, sink: &dyn ItemSink) -> Result<(), String> {
        for word in text.split_whitespace() {
            if !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            sink.emit(Value::String(Self::transform(word)));
        }
        Ok(())
    }
}

struct FrameSink {
    tx: mpsc::UnboundedSender<Frame>,
}

impl ItemSink for FrameSink {
    fn emit(&self, value: Value) {
        let data = serde_json::to_value(ItemPayload { value }).ok();
        let _ = self.tx.send(Frame::new(ITEM_EVENT, data));
    }
}

/// Reference processing service speaking the session protocol over WebSocket.
pub struct StreamServer {
    listener: TcpListener,
    processor: Arc<dyn Processor>,
}

impl StreamServer {
    pub async fn bind(addr: &str, processor: Arc<dyn Processor>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            processor,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop on a background task.
    pub fn spawn(self) -> JoinHandle<io::Result<()>> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> io::Result<()> {
        stream_info!("listening on {}", self.listener.local_addr()?);
        let next_id = AtomicU64::new(1);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let client_id = next_id.fetch_add(1, Ordering::Relaxed);
            let processor = self.processor.clone();
            tokio::spawn(async move {
                serve_client(client_id, peer, stream, processor).await;
            });
        }
    }
}

async fn serve_client(
    client_id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    processor: Arc<dyn Processor>,
) {
    let socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(err) => {
            stream_warn!("handshake with {} failed: {}", peer, err);
            return;
        }
    };
    stream_info!("client {} connected from {}", client_id, peer);

    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = frame.encode() else {
                continue;
            };
            stream_wire!("client {} -> {}", client_id, text);
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = source.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                stream_debug!("client {} read error: {}", client_id, err);
                break;
            }
        };
        let frame = match Frame::decode(&text) {
            Ok(frame) => frame,
            Err(err) => {
                stream_warn!("client {}: {}", client_id, err);
                continue;
            }
        };
        if frame.event != START_PROCESSING_EVENT {
            stream_debug!("client {} sent unhandled '{}'", client_id, frame.event);
            continue;
        }
        // Jobs on one connection run back to back.
        run_job(client_id, frame.data, processor.as_ref(), &tx).await;
    }

    drop(tx);
    let _ = writer.await;
    stream_info!("client {} disconnected", client_id);
}

async fn run_job(
    client_id: u64,
    data: Option<Value>,
    processor: &dyn Processor,
    tx: &mpsc::UnboundedSender<Frame>,
) {
    let text = data
        .and_then(|value| serde_json::from_value::<StartProcessing>(value).ok())
        .map(|start| start.text)
        .unwrap_or_default();
    if text.is_empty() {
        send_error(tx, EMPTY_TEXT_MESSAGE.to_string());
        return;
    }

    stream_info!("client {} job started ({} chars)", client_id, text.len());
    let sink = FrameSink { tx: tx.clone() };
    match processor.process(&text, &sink).await {
        Ok(()) => {
            let done = DonePayload {
                message: Some(COMPLETE_MESSAGE.to_string()),
            };
            let _ = tx.send(Frame::new(DONE_EVENT, serde_json::to_value(done).ok()));
        }
        Err(message) => send_error(tx, message),
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Frame>, message: String) {
    let payload = ErrorPayload {
        message: Some(message),
    };
    let _ = tx.send(Frame::new(ERROR_EVENT, serde_json::to_value(payload).ok()));
}
