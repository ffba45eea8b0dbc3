use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FrameError;

pub const START_PROCESSING_EVENT: &str = "start_processing";
pub const ITEM_EVENT: &str = "item";
pub const DONE_EVENT: &str = "done";
pub const ERROR_EVENT: &str = "error";
/// Reserved: raised locally by the transport, never sent on the wire.
pub const CONNECT_EVENT: &str = "connect";
/// Reserved: raised locally by the transport, never sent on the wire.
pub const DISCONNECT_EVENT: &str = "disconnect";

/// One named event on the wire: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProcessing {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DonePayload {
    #[serde(default)]
    pub message: Option<String>,
}

/// Strings are kept verbatim; any other JSON value is stored in compact form.
pub fn item_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
