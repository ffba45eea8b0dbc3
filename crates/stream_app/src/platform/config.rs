//! Optional RON settings file; command-line flags override its values.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use stream_engine::{ChannelSettings, ControllerSettings};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/ws";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: String,
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    /// Zero disables the idle watchdog.
    pub idle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_secs: 10,
            idle_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub item_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            item_delay_ms: 1000,
        }
    }
}

impl ServerConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
