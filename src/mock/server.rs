//! Mock detection backend.
//!
//! # Responsibilities
//! - Serve `/detect` with a correlation-derived event id and a random verdict
//! - Serve `/hccheck` with a random health flag
//! - Offer deterministic overrides for automated tests
//!
//! # Design Decisions
//! - Randomness comes from a seedable StdRng; unseeded servers mix wall
//!   clock and pid like any throwaway fixture
//! - Overrides win over randomness so tests never depend on luck

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::schema::{MockServerConfig, DEFAULT_HEALTH_PATH};
use crate::detect::types::DetectPayload;
use crate::health::types::HealthPayload;

const DEFAULT_CORRELATION_HEADER_LOWER: &str = "xinner-logid";

/// Request counters exposed to tests.
#[derive(Debug, Default)]
pub struct MockStats {
    detect_requests: AtomicU64,
    health_requests: AtomicU64,
}

impl MockStats {
    pub fn detect_requests(&self) -> u64 {
        self.detect_requests.load(Ordering::SeqCst)
    }

    pub fn health_requests(&self) -> u64 {
        self.health_requests.load(Ordering::SeqCst)
    }
}

/// Deterministic answers that replace the random ones when set.
#[derive(Debug, Clone, Default)]
struct Overrides {
    event_id: Option<String>,
    detect_flag: Option<i64>,
    detect_status: Option<StatusCode>,
    health_flag: Option<i64>,
    health_status: Option<StatusCode>,
}

struct MockState {
    rng: Mutex<StdRng>,
    block_per_mille: u32,
    unhealthy_per_mille: u32,
    correlation_header: HeaderName,
    overrides: Overrides,
    stats: Arc<MockStats>,
}

impl MockState {
    /// Draw against a chance out of 1000.
    fn roll(&self, per_mille: u32) -> bool {
        let n: u32 = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..1000),
            Err(poisoned) => poisoned.into_inner().gen_range(0..1000),
        };
        n < per_mille
    }
}

/// Mock WAF server answering the detect and health-check endpoints.
pub struct MockWafServer {
    config: MockServerConfig,
    overrides: Overrides,
    stats: Arc<MockStats>,
}

impl MockWafServer {
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            overrides: Overrides::default(),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Always answer detections with `flag`, and with `event_id` when given.
    pub fn with_verdict(mut self, event_id: Option<&str>, flag: i64) -> Self {
        self.overrides.event_id = event_id.map(str::to_string);
        self.overrides.detect_flag = Some(flag);
        self
    }

    /// Always answer detections with `status` and an empty body.
    pub fn with_detect_status(mut self, status: StatusCode) -> Self {
        self.overrides.detect_status = Some(status);
        self
    }

    /// Always answer health checks with `flag`.
    pub fn with_health_flag(mut self, flag: i64) -> Self {
        self.overrides.health_flag = Some(flag);
        self
    }

    /// Always answer health checks with `status` and an empty body.
    pub fn with_health_status(mut self, status: StatusCode) -> Self {
        self.overrides.health_status = Some(status);
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let seed = self.config.seed.unwrap_or_else(entropy_seed);
        let state = Arc::new(MockState {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            block_per_mille: self.config.block_per_mille,
            unhealthy_per_mille: self.config.unhealthy_per_mille,
            correlation_header: HeaderName::from_bytes(self.config.correlation_header.as_bytes())
                .unwrap_or_else(|_| HeaderName::from_static(DEFAULT_CORRELATION_HEADER_LOWER)),
            overrides: self.overrides.clone(),
            stats: self.stats.clone(),
        });

        tracing::debug!(seed, "Mock WAF server rng seeded");

        Router::new()
            .route("/detect", any(detect_handler))
            .route(DEFAULT_HEALTH_PATH, any(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            block_per_mille = self.config.block_per_mille,
            unhealthy_per_mille = self.config.unhealthy_per_mille,
            "Mock WAF server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Mock WAF server received shutdown signal");
            })
            .await?;

        tracing::info!("Mock WAF server stopped");
        Ok(())
    }

    /// Bind `addr` and serve in a background task. Returns the bound address.
    pub async fn spawn(
        self,
        addr: SocketAddr,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<SocketAddr, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = self.run(listener, shutdown).await {
                tracing::error!(error = %e, "Mock WAF server failed");
            }
        });
        Ok(local_addr)
    }
}

fn entropy_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    nanos ^ u64::from(std::process::id()).rotate_left(32)
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Event id derived from the correlation header values.
fn event_id_for(headers: &HeaderMap, correlation_header: &HeaderName) -> String {
    let values: Vec<&str> = headers
        .get_all(correlation_header)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        format!("event_id_{}", unix_secs())
    } else {
        format!("event_id_{}", values.join("_"))
    }
}

async fn detect_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.stats.detect_requests.fetch_add(1, Ordering::SeqCst);

    for (name, value) in headers.iter() {
        tracing::debug!(header = %name, value = ?value, "Detect request header");
    }
    tracing::debug!(body_len = body.len(), "Detect request body");

    if let Some(status) = state.overrides.detect_status {
        return status.into_response();
    }

    let event_id = state
        .overrides
        .event_id
        .clone()
        .unwrap_or_else(|| event_id_for(&headers, &state.correlation_header));

    let result_flag = match state.overrides.detect_flag {
        Some(flag) => flag,
        None if state.roll(state.block_per_mille) => 1,
        None => 0,
    };
    if result_flag != 0 {
        tracing::info!(event_id = %event_id, "http req attack");
    }

    Json(DetectPayload { event_id, result_flag }).into_response()
}

async fn health_handler(State(state): State<Arc<MockState>>) -> Response {
    state.stats.health_requests.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = state.overrides.health_status {
        return status.into_response();
    }

    let result_flag = match state.overrides.health_flag {
        Some(flag) => flag,
        None if state.roll(state.unhealthy_per_mille) => 1,
        None => 0,
    };
    let msg = if result_flag == 0 { "Succ" } else { "server unavailable" };

    Json(HealthPayload {
        result_flag,
        msg: msg.to_string(),
    })
    .into_response()
}
