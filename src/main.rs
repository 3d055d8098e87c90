//! velosim binary: parse configuration, set up logging, run the simulator.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use velosim::config::CliArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("velosim=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = CliArgs::parse().resolve()?;
    velosim::run_server(config).await
}
