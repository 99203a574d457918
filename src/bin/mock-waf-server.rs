use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use waf_client::config::{load_config, WafConfig};
use waf_client::lifecycle::Shutdown;
use waf_client::mock::MockWafServer;
use waf_client::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mock-waf-server")]
#[command(about = "Mock WAF detection backend for integration testing", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WAF HTTP server listening port, overrides mock_server.bind_address
    #[arg(short, long)]
    port: Option<u16>,

    /// RNG seed for reproducible verdicts
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WafConfig::default(),
    };

    logging::init_logging(&config.observability.log_filter);
    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    if let Some(port) = cli.port {
        config.mock_server.bind_address = format!("0.0.0.0:{}", port);
    }
    if cli.seed.is_some() {
        config.mock_server.seed = cli.seed;
    }

    let listener = TcpListener::bind(&config.mock_server.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    MockWafServer::new(config.mock_server)
        .run(listener, shutdown.subscribe())
        .await?;

    Ok(())
}
