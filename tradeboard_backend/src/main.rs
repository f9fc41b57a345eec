use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tradeboard_backend::api;
use tradeboard_backend::bootstrap;
use tradeboard_backend::config::{TradeboardConfig, TradeboardPaths};
use tradeboard_backend::telemetry;

#[derive(Parser)]
#[command(author, version, about = "Tradeboard backend server")]
struct Args {
    /// Port for the HTTP API (overrides TRADEBOARD_API_PORT, default 8080)
    #[arg(long)]
    port: Option<u16>,
    /// Base directory for data and static assets (overrides TRADEBOARD_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    let mut config = TradeboardConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        config.paths = TradeboardPaths::from_base_dir(dir)?;
    }
    if let Some(port) = args.port {
        config.api_port = port;
    }

    let resources = bootstrap::initialize(&config)?;
    api::serve_http(config, resources.database).await
}
