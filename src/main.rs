//! WAF client CLI.
//!
//! Runs liveness probes and sample detections against a detection backend.
//!
//! ```text
//! waf-client health --count 10
//! waf-client detect --count 10 --url https://api.example.com/endpoint --body abcdefg
//! waf-client monitor
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use axum::http::Request;
use url::Url;

use waf_client::config::{load_config, WafConfig};
use waf_client::health::{HealthMonitor, HealthProbe};
use waf_client::lifecycle::Shutdown;
use waf_client::observability::{logging, metrics};
use waf_client::{TcpConnectionFactory, WafClient, WafResult};

#[derive(Parser)]
#[command(name = "waf-client")]
#[command(about = "Probe and exercise a WAF detection backend", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run liveness checks against the backend
    Health {
        /// Backend address, overrides health_check.address
        #[arg(long)]
        addr: Option<SocketAddr>,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Send sample requests through the detection client
    Detect {
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// URL of the sample request being inspected
        #[arg(long, default_value = "https://api.example.com/endpoint")]
        url: String,
        #[arg(long, default_value = "POST")]
        method: String,
        #[arg(long, default_value = "abcdefg")]
        body: String,
        /// Correlation id prefix; a UUID is generated when absent
        #[arg(long)]
        log_id: Option<String>,
    },
    /// Probe periodically until interrupted
    Monitor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WafConfig::default(),
    };

    logging::init_logging(&config.observability.log_filter);
    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    match cli.command {
        Commands::Health { addr, count } => {
            let probe = match addr {
                Some(addr) => HealthProbe::new(addr, &config.health_check),
                None => HealthProbe::from_config(&config.health_check)?,
            };
            for idx in 0..count {
                match probe.check().await {
                    Ok(status) => println!("[{}] healthy: {}", idx, status.message),
                    Err(e) => println!("[{}] unhealthy: {}", idx, e),
                }
            }
        }
        Commands::Detect {
            count,
            url,
            method,
            body,
            log_id,
        } => {
            let factory = tcp_factory(&config)?;
            let client = WafClient::new(factory, &config.client)?;
            let request = sample_request(&method, &url, body)?;
            tracing::info!(
                detect_url = %config.client.detect_url,
                pool_size = client.pool_size(),
                count,
                "Sending sample detections"
            );

            for idx in 0..count {
                let correlation_id = match &log_id {
                    Some(prefix) => format!("{}-{}", prefix, idx),
                    None => uuid::Uuid::new_v4().to_string(),
                };
                match client.detect_request(&request, &correlation_id).await {
                    Ok(verdict) => println!(
                        "[{}] event_id={} result={}",
                        correlation_id,
                        verdict.event_id(),
                        verdict.result_flag()
                    ),
                    Err(e) => println!("[{}] error: {}", correlation_id, e),
                }
            }

            client.shutdown(Duration::from_secs(5)).await;
        }
        Commands::Monitor => {
            let probe = HealthProbe::from_config(&config.health_check)?;
            let monitor = HealthMonitor::new(probe, &config.health_check);
            let shutdown = Shutdown::new();
            shutdown.trigger_on_signal();
            monitor.run(shutdown.subscribe()).await;
        }
    }

    Ok(())
}

/// Factory dialing every address the detect URL resolves to.
fn tcp_factory(config: &WafConfig) -> Result<TcpConnectionFactory, Box<dyn std::error::Error>> {
    let url = Url::parse(&config.client.detect_url)?;
    let addrs = url.socket_addrs(|| Some(80))?;
    tracing::debug!(addrs = ?addrs, "Resolved waf server addresses");
    Ok(TcpConnectionFactory::round_robin(
        addrs,
        config.client.handshake_timeout(),
    ))
}

/// A representative inbound request to inspect.
fn sample_request(method: &str, url: &str, body: String) -> Result<Request<Bytes>, Box<dyn std::error::Error>> {
    let request = Request::builder()
        .method(method)
        .uri(url)
        .header("content-type", "text/plain")
        .header("accept", "application/json")
        .header("user-agent", "waf-client/0.1")
        .header("cache-control", "no-cache")
        .header("cookie", "session_id=abc123xyz")
        .body(Bytes::from(body))?;
    Ok(request)
}
