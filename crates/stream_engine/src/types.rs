use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub connect_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("connecting to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },
    #[error("not connected to the processing service")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}
