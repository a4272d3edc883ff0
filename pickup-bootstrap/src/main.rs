use anyhow::Result;
use clap::Parser;
use tracing::info;

use pickup_infrastructure::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "pickup-watch")]
#[command(about = "Polls pickup volleyball listings and reports new games", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// Keep polling every `poll_interval_seconds` until interrupted
    #[arg(short, long)]
    watch: bool,

    /// Emit JSON log lines on stdout
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(config) = &args.config {
        std::env::set_var("PICKUP_CONFIG", config);
    }

    let config = AppConfig::load().await?;
    let _log_guard = pickup_bootstrap::logging::init_tracing(&config.log_dir, args.json_logs)?;
    info!(watch = args.watch, "pickup watch starting");

    pickup_bootstrap::run(config, args.watch).await
}
