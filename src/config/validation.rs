//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool size > 0, probabilities <= 1000)
//! - Validate addresses and the detection URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WafConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::WafConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &WafConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let client = &config.client;
    if client.pool_size == 0 {
        errors.push(ValidationError::new("client.pool_size", "must be greater than 0"));
    }
    for (field, value) in [
        ("client.request_timeout_secs", client.request_timeout_secs),
        ("client.idle_timeout_secs", client.idle_timeout_secs),
        ("client.handshake_timeout_secs", client.handshake_timeout_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.connect_timeout_ms", config.health_check.connect_timeout_ms),
        (
            "health_check.unhealthy_threshold",
            u64::from(config.health_check.unhealthy_threshold),
        ),
        ("health_check.healthy_threshold", u64::from(config.health_check.healthy_threshold)),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    match Url::parse(&client.detect_url) {
        Ok(url) if url.scheme() != "http" => {
            errors.push(ValidationError::new(
                "client.detect_url",
                format!("unsupported scheme '{}', expected http", url.scheme()),
            ));
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("client.detect_url", "missing host"));
        }
        Ok(_) => {}
        Err(e) => {
            errors.push(ValidationError::new("client.detect_url", e.to_string()));
        }
    }

    for (field, value) in [
        ("client.correlation_header", &client.correlation_header),
        ("mock_server.correlation_header", &config.mock_server.correlation_header),
    ] {
        if axum::http::HeaderName::from_bytes(value.as_bytes()).is_err() {
            errors.push(ValidationError::new(field, "not a valid header name"));
        }
    }

    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }
    if config.health_check.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "health_check.address",
            format!("invalid socket address '{}'", config.health_check.address),
        ));
    }

    let mock = &config.mock_server;
    if mock.block_per_mille > 1000 {
        errors.push(ValidationError::new("mock_server.block_per_mille", "must be at most 1000"));
    }
    if mock.unhealthy_per_mille > 1000 {
        errors.push(ValidationError::new(
            "mock_server.unhealthy_per_mille",
            "must be at most 1000",
        ));
    }
    if mock.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "mock_server.bind_address",
            format!("invalid socket address '{}'", mock.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
