mod platform;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = platform::cli::Cli::parse();
    platform::run_app(cli).await
}
