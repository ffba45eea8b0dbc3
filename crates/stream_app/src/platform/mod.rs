pub mod cli;
mod client;
mod config;
mod logging;
mod serve;
mod ui;

use anyhow::Context;
use stream_logging::stream_debug;

use cli::{Cli, Command};

pub async fn run_app(cli: Cli) -> anyhow::Result<()> {
    logging::initialize(cli.log, cli.verbose);

    let mut config = config::load(cli.config.as_deref()).context("loading settings")?;
    stream_debug!("effective settings before overrides: {:?}", config);

    match cli.command {
        Command::Client(args) => {
            args.apply(&mut config.client);
            client::run_client(config.client).await
        }
        Command::Serve(args) => {
            args.apply(&mut config.server);
            serve::run_server(config.server).await
        }
    }
}
