use std::sync::Arc;

use anyhow::Context;
use stream_engine::{ReverseWords, StreamServer};
use stream_logging::stream_info;

use super::config::ServerConfig;

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let processor = Arc::new(ReverseWords::new(config.item_delay()));
    let server = StreamServer::bind(&config.bind, processor)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    let addr = server.local_addr()?;
    println!("serving on ws://{addr}/ws (ctrl-c to stop)");

    tokio::select! {
        result = server.run() => result.context("accept loop failed")?,
        _ = tokio::signal::ctrl_c() => stream_info!("interrupted; shutting down"),
    }
    Ok(())
}
