//! Active health checking.
//!
//! # Responsibilities
//! - Run one liveness exchange on a caller-owned connection
//! - Dial and probe the backend from config (`HealthProbe`)
//! - Periodically probe and track healthy/unhealthy state (`HealthMonitor`)
//!
//! # Design Decisions
//! - The exchange consumes the connection; it is never reused
//! - `health_check` applies no timeout; callers bound it (HealthProbe does)
//! - hyper's HTTP/1 client connection owns framing, so a complete reply
//!   returns even when the backend keeps the socket open

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONNECTION, HOST};
use axum::http::{Method, Request, StatusCode};
use futures_util::future::{self, Either};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::{HealthCheckConfig, DEFAULT_HEALTH_PATH};
use crate::error::{Stage, WafError};
use crate::health::types::{decode_health, HealthStatus};
use crate::net::BackendConnection;
use crate::observability::metrics;

/// Largest response body accepted.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Probe the backend on `conn` using the default health-check path.
pub async fn health_check<C: BackendConnection>(conn: C) -> Result<HealthStatus, WafError> {
    health_check_path(conn, DEFAULT_HEALTH_PATH).await
}

/// Probe the backend on `conn` using `path`.
///
/// Returns the decoded status when the backend reports healthy, and an
/// `Unhealthy` error naming the flag otherwise.
pub async fn health_check_path<C: BackendConnection>(
    conn: C,
    path: &str,
) -> Result<HealthStatus, WafError> {
    let host = conn
        .peer_addr()
        .map_err(|e| WafError::transport(Stage::Dial, e))?;

    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(HOST, host.to_string())
        .header(CONNECTION, "close")
        .body(Body::empty())
        .map_err(|e| WafError::InvalidRequest(format!("health path '{}': {}", path, e)))?;

    let (mut sender, connection) = http1::Builder::new()
        .title_case_headers(true)
        .handshake::<_, Body>(TokioIo::new(conn))
        .await
        .map_err(|e| WafError::transport(Stage::Write, e))?;

    let exchange = async move {
        let response = sender.send_request(request).await.map_err(exchange_error)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(WafError::BackendStatus { status });
        }
        axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_SIZE)
            .await
            .map_err(|e| WafError::transport(Stage::Read, e))
    };
    tokio::pin!(exchange);
    tokio::pin!(connection);

    // The connection future drives the socket; once it ends the exchange
    // can only finish with what was already delivered.
    let body = match future::select(exchange, connection).await {
        Either::Left((result, _connection)) => result?,
        Either::Right((finished, exchange)) => {
            if let Err(e) = finished {
                tracing::debug!(addr = %host, error = %e, "Health check connection ended");
            }
            exchange.await?
        }
    };

    decode_health(&body)?.into_result()
}

/// Stage of a failed request/response exchange.
fn exchange_error(err: hyper::Error) -> WafError {
    let stage = if err.is_parse() || err.is_incomplete_message() {
        Stage::Read
    } else {
        Stage::Write
    };
    WafError::transport(stage, err)
}

/// Dials the backend and runs one bounded liveness exchange.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    addr: SocketAddr,
    path: String,
    connect_timeout: Duration,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(addr: SocketAddr, config: &HealthCheckConfig) -> Self {
        Self {
            addr,
            path: config.path.clone(),
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
        }
    }

    /// Build a probe from config, parsing `config.address`.
    pub fn from_config(config: &HealthCheckConfig) -> Result<Self, WafError> {
        let addr = config.address.parse().map_err(|e| {
            WafError::InvalidConfig(format!("health_check.address '{}': {}", config.address, e))
        })?;
        Ok(Self::new(addr, config))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Dial a fresh connection and run one health check.
    pub async fn check(&self) -> Result<HealthStatus, WafError> {
        let result = self.check_inner().await;
        metrics::record_health_check(result.is_ok());
        match &result {
            Ok(status) => tracing::debug!(addr = %self.addr, msg = %status.message, "Health check passed"),
            Err(e) => tracing::warn!(addr = %self.addr, error = %e, "Health check failed"),
        }
        result
    }

    async fn check_inner(&self) -> Result<HealthStatus, WafError> {
        let conn = match time::timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(WafError::transport(Stage::Dial, e)),
            Err(_) => {
                return Err(WafError::transport(
                    Stage::Dial,
                    format!("connect to {} timed out", self.addr),
                ))
            }
        };

        match time::timeout(self.timeout, health_check_path(conn, &self.path)).await {
            Ok(result) => result,
            Err(_) => Err(WafError::transport(
                Stage::Timeout,
                format!("health check exceeded {:?}", self.timeout),
            )),
        }
    }
}

/// Periodic prober with hysteresis on the healthy/unhealthy state.
pub struct HealthMonitor {
    probe: HealthProbe,
    interval: Duration,
    healthy_threshold: usize,
    unhealthy_threshold: usize,
    healthy: AtomicBool,
    consecutive_successes: AtomicUsize,
    consecutive_failures: AtomicUsize,
}

impl HealthMonitor {
    /// New monitor; the backend starts out considered healthy.
    pub fn new(probe: HealthProbe, config: &HealthCheckConfig) -> Self {
        Self {
            probe,
            interval: config.interval(),
            healthy_threshold: config.healthy_threshold.max(1) as usize,
            unhealthy_threshold: config.unhealthy_threshold.max(1) as usize,
            healthy: AtomicBool::new(true),
            consecutive_successes: AtomicUsize::new(0),
            consecutive_failures: AtomicUsize::new(0),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            addr = %self.probe.addr(),
            interval_secs = self.interval.as_secs(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let healthy = self.probe.check().await.is_ok();
                    self.observe(healthy);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Feed one check result into the state machine.
    pub fn observe(&self, success: bool) {
        if success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            if self.is_healthy() {
                return;
            }
            let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.healthy_threshold {
                self.healthy.store(true, Ordering::Relaxed);
                self.consecutive_successes.store(0, Ordering::Relaxed);
                tracing::info!(addr = %self.probe.addr(), "WAF server marked healthy");
            }
        } else {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            if !self.is_healthy() {
                return;
            }
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= self.unhealthy_threshold {
                self.healthy.store(false, Ordering::Relaxed);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                tracing::warn!(addr = %self.probe.addr(), "WAF server marked unhealthy");
            }
        }
    }
}
