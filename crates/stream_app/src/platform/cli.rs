use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::config::{ClientConfig, ServerConfig};
use super::logging::LogDestination;

/// Submit text jobs to a streaming processing service, or run one.
#[derive(Debug, Parser)]
#[command(name = "stream_app", version, about)]
pub struct Cli {
    /// RON settings file; flags below take precedence over it.
    #[arg(long, global = true, env = "STREAM_APP_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "terminal")]
    pub log: LogDestination,

    /// Log everything, including each frame on the wire.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to a service and submit each stdin line as a job.
    Client(ClientArgs),
    /// Run the reference processing service.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct ClientArgs {
    /// Service address, e.g. ws://127.0.0.1:8000/ws.
    #[arg(long, env = "STREAM_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// Fail a job after this many silent seconds; 0 disables.
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
}

impl ClientArgs {
    pub fn apply(self, config: &mut ClientConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.idle_timeout_secs = secs;
        }
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long, env = "STREAM_BIND")]
    pub bind: Option<String>,

    /// Pause before each emitted item, in milliseconds.
    #[arg(long)]
    pub item_delay_ms: Option<u64>,
}

impl ServeArgs {
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(ms) = self.item_delay_ms {
            config.item_delay_ms = ms;
        }
    }
}
