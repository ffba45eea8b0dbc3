//! Stream engine: session connection, controller shell and reference service.
mod channel;
mod controller;
mod frame;
mod memory;
mod server;
mod types;
mod ws;

pub use channel::{Channel, Handler, HandlerRegistry, Payload};
pub use controller::{ControllerSettings, SessionController};
pub use frame::{
    item_text, DonePayload, ErrorPayload, Frame, ItemPayload, StartProcessing, CONNECT_EVENT,
    DISCONNECT_EVENT, DONE_EVENT, ERROR_EVENT, ITEM_EVENT, START_PROCESSING_EVENT,
};
pub use memory::MemoryChannel;
pub use server::{ItemSink, Processor, ReverseWords, StreamServer};
pub use types::{ChannelSettings, ConnectionError, FrameError};
pub use ws::WsChannel;
