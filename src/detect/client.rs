//! Pooled detection client.
//!
//! # Responsibilities
//! - Forward a dumped copy of an inbound request to the detection backend
//! - Bound concurrency and reuse with a pool fed by the connection factory
//! - Decode the backend verdict
//! - Close (fail fast) and shutdown (close, then drain in-flight calls)
//!
//! # Design Decisions
//! - At most `pool_size` detections are in flight; the gate is a semaphore
//!   so at most `pool_size` factory dials can run at once
//! - The closed flag is atomic and closes the semaphore with it
//! - The factory can be swapped live; only later dials use the new one

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{HeaderName, Request, StatusCode, Uri};
use bytes::Bytes;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::Semaphore;

use crate::config::ClientConfig;
use crate::detect::probe::build_probe;
use crate::detect::types::{decode_verdict, Verdict};
use crate::error::{Stage, WafError};
use crate::net::{factory_slot, ConnectionFactory, FactoryConnector, FactorySlot};
use crate::observability::metrics;

/// Largest detection response body accepted.
const MAX_RESPONSE_BODY: usize = 1024 * 1024;

/// Poll interval while draining in-flight detections.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

type PoolClient = Client<FactoryConnector, Body>;

/// Client handle forwarding requests to the detection backend.
pub struct WafClient {
    client: ArcSwapOption<PoolClient>,
    factory: FactorySlot,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
    in_flight: Arc<AtomicUsize>,
    detect_uri: Uri,
    correlation_header: HeaderName,
    request_timeout: Duration,
    pool_size: usize,
}

impl WafClient {
    /// Build a client dialing through `factory`.
    pub fn new(factory: impl ConnectionFactory, config: &ClientConfig) -> Result<Self, WafError> {
        if config.pool_size == 0 {
            return Err(WafError::InvalidConfig("pool_size must be greater than 0".into()));
        }
        let detect_uri: Uri = config
            .detect_url
            .parse()
            .map_err(|e| WafError::InvalidConfig(format!("detect_url '{}': {}", config.detect_url, e)))?;
        if detect_uri.authority().is_none() {
            return Err(WafError::InvalidConfig(format!(
                "detect_url '{}' is not absolute",
                config.detect_url
            )));
        }
        let correlation_header = HeaderName::from_bytes(config.correlation_header.as_bytes())
            .map_err(|e| WafError::InvalidConfig(format!("correlation_header: {}", e)))?;

        let factory = factory_slot(factory);
        let connector = FactoryConnector::new(factory.clone(), config.handshake_timeout());
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.pool_size)
            .pool_idle_timeout(config.idle_timeout())
            .pool_timer(TokioTimer::new())
            .build(connector);

        tracing::debug!(
            detect_url = %detect_uri,
            pool_size = config.pool_size,
            request_timeout_secs = config.request_timeout_secs,
            "WAF client created"
        );

        Ok(Self {
            client: ArcSwapOption::from_pointee(client),
            factory,
            permits: Arc::new(Semaphore::new(config.pool_size)),
            closed: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
            detect_uri,
            correlation_header,
            request_timeout: config.request_timeout(),
            pool_size: config.pool_size,
        })
    }

    /// Build a client with default settings and the given pool size.
    pub fn with_pool_size(factory: impl ConnectionFactory, pool_size: usize) -> Result<Self, WafError> {
        let config = ClientConfig {
            pool_size,
            ..ClientConfig::default()
        };
        Self::new(factory, &config)
    }

    /// Forward `request` to the backend and decode its verdict.
    pub async fn detect_request(
        &self,
        request: &Request<Bytes>,
        correlation_id: &str,
    ) -> Result<Verdict, WafError> {
        if self.is_closed() {
            return Err(WafError::Closed);
        }
        let _guard = InFlightGuard::new(&self.in_flight);
        let start = Instant::now();

        let probe = build_probe(request, &self.detect_uri, &self.correlation_header, correlation_id)?;

        let result = match tokio::time::timeout(self.request_timeout, self.execute(probe)).await {
            Ok(result) => result,
            Err(_) => Err(WafError::transport(
                Stage::Timeout,
                format!("detection exceeded {:?}", self.request_timeout),
            )),
        };

        match &result {
            Ok(verdict) => {
                metrics::record_detect(verdict.result.as_str(), start);
                if verdict.is_blocked() {
                    tracing::info!(
                        correlation_id = %correlation_id,
                        event_id = %verdict.event_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        "Request blocked by waf server"
                    );
                } else {
                    tracing::debug!(
                        correlation_id = %correlation_id,
                        event_id = %verdict.event_id,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Request passed waf detection"
                    );
                }
            }
            Err(e) => {
                metrics::record_detect(error_label(e), start);
                tracing::warn!(correlation_id = %correlation_id, error = %e, "WAF detection failed");
            }
        }
        result
    }

    async fn execute(&self, probe: Request<Body>) -> Result<Verdict, WafError> {
        let _permit = self.permits.acquire().await.map_err(|_| WafError::Closed)?;
        let client = self.client.load_full().ok_or(WafError::Closed)?;

        let response = client.request(probe).await.map_err(|e| {
            let stage = if e.is_connect() { Stage::Dial } else { Stage::Exchange };
            WafError::transport(stage, e)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(WafError::BackendStatus { status });
        }

        let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BODY)
            .await
            .map_err(|e| WafError::transport(Stage::Read, e))?;

        decode_verdict(&body)
    }

    /// Replace the connection factory used for connections dialed from now on.
    ///
    /// Connections already pooled keep whatever dialing produced them.
    pub fn update_connection_factory(&self, factory: impl ConnectionFactory) {
        if self.is_closed() {
            return;
        }
        self.factory.store(Arc::new(Box::new(factory) as Box<dyn ConnectionFactory>));
        tracing::info!("WAF connection factory replaced");
    }

    /// Close the client: later detections fail fast with `Closed`.
    ///
    /// In-flight detections are not cancelled. Idle pooled connections are
    /// released once no in-flight detection holds the pool.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.permits.close();
        self.client.store(None);
        tracing::info!(in_flight = self.in_flight(), "WAF client closed");
    }

    /// Close the client and wait up to `grace` for in-flight detections.
    ///
    /// Returns true when every in-flight detection finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.close();
        let drained = tokio::time::timeout(grace, async {
            while self.in_flight.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok();

        if drained {
            tracing::info!("WAF client drained");
        } else {
            tracing::warn!(
                in_flight = self.in_flight(),
                grace_ms = grace.as_millis() as u64,
                "WAF client shutdown grace period elapsed"
            );
        }
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of detections currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

impl std::fmt::Debug for WafClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WafClient")
            .field("detect_uri", &self.detect_uri)
            .field("pool_size", &self.pool_size)
            .field("request_timeout", &self.request_timeout)
            .field("closed", &self.is_closed())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn error_label(err: &WafError) -> &'static str {
    match err {
        WafError::Closed => "closed",
        WafError::Transport { stage: Stage::Timeout, .. } => "timeout",
        WafError::Transport { .. } => "transport",
        WafError::BackendStatus { .. } => "backend_status",
        WafError::Decode { .. } => "decode",
        WafError::Unhealthy { .. } => "unhealthy",
        WafError::InvalidRequest(_) | WafError::InvalidConfig(_) => "invalid",
    }
}

/// Guard that counts an in-flight detection.
/// Decrements the count when dropped.
struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn new(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self {
            count: Arc::clone(count),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}
