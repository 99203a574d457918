//! Configuration schema definitions.
//!
//! This module defines the configuration for the detection client, the
//! liveness prober and the mock backend. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default detection endpoint of the backend.
pub const DEFAULT_DETECT_URL: &str = "http://127.0.0.1:8899/detect";

/// Default health-check path of the backend.
pub const DEFAULT_HEALTH_PATH: &str = "/hccheck";

/// Default correlation header carried on every probe.
pub const DEFAULT_CORRELATION_HEADER: &str = "XInner-LogId";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WafConfig {
    /// Detection client and pooled transport settings.
    pub client: ClientConfig,

    /// Liveness probe settings.
    pub health_check: HealthCheckConfig,

    /// Mock backend settings.
    pub mock_server: MockServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Detection client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Absolute URL of the backend detection endpoint.
    pub detect_url: String,

    /// Cap on simultaneous and idle connections toward the backend.
    pub pool_size: usize,

    /// Upper bound on one detection round trip, in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound an idle pooled connection is kept, in seconds.
    pub idle_timeout_secs: u64,

    /// Upper bound on a single connection factory dial, in seconds.
    pub handshake_timeout_secs: u64,

    /// Header carrying the caller's correlation id.
    pub correlation_header: String,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            detect_url: DEFAULT_DETECT_URL.to_string(),
            pool_size: 10,
            request_timeout_secs: 10,
            idle_timeout_secs: 90,
            handshake_timeout_secs: 10,
            correlation_header: DEFAULT_CORRELATION_HEADER.to_string(),
        }
    }
}

/// Liveness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Backend address the probe dials (e.g., "127.0.0.1:8899").
    pub address: String,

    /// Path to probe.
    pub path: String,

    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Deadline for the whole exchange in seconds.
    pub timeout_secs: u64,

    /// Interval between checks when monitoring, in seconds.
    pub interval_secs: u64,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8899".to_string(),
            path: DEFAULT_HEALTH_PATH.to_string(),
            connect_timeout_ms: 1000,
            timeout_secs: 5,
            interval_secs: 10,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Mock backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockServerConfig {
    /// Bind address (e.g., "0.0.0.0:8899").
    pub bind_address: String,

    /// Chance, out of 1000, that a detection is answered with Block.
    pub block_per_mille: u32,

    /// Chance, out of 1000, that a health check is answered with Unhealthy.
    pub unhealthy_per_mille: u32,

    /// RNG seed. Seeded from wall clock and pid when unset.
    pub seed: Option<u64>,

    /// Header whose values form the event id.
    pub correlation_header: String,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8899".to_string(),
            block_per_mille: 5,
            unhealthy_per_mille: 10,
            seed: None,
            correlation_header: DEFAULT_CORRELATION_HEADER.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address for the Prometheus scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "waf_client=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
