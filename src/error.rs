//! Error taxonomy shared by the detection client and the liveness prober.
//!
//! Every failure carries the stage it happened in, so callers can tell a
//! dial failure from a broken write, a short read or a timeout.

use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error used as the `source` of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where in an exchange a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The connection factory failed or timed out.
    Dial,
    /// The pooled HTTP exchange failed (write or read, as reported by the pool).
    Exchange,
    /// Writing the request onto the connection failed.
    Write,
    /// Reading or parsing the response failed.
    Read,
    /// The request timeout elapsed before a response was received.
    Timeout,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Dial => "dial",
            Stage::Exchange => "exchange",
            Stage::Write => "write",
            Stage::Read => "read",
            Stage::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Errors returned by detection and health-check calls.
#[derive(Debug, Error)]
pub enum WafError {
    /// The client handle has been closed.
    #[error("waf client has been closed")]
    Closed,

    /// Network failure before a full response was received.
    #[error("transport failure during {stage}: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: BoxError,
    },

    /// The backend answered with a non-success status.
    #[error("non-200 status code received: {status}")]
    BackendStatus { status: StatusCode },

    /// The backend answered with a body that is not a valid payload.
    #[error("failed to decode {payload} payload: {source}")]
    Decode {
        payload: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The health payload decoded to a non-healthy flag.
    #[error("waf server is not available. flag:{flag} msg:{message}")]
    Unhealthy { flag: i64, message: String },

    /// The original request cannot be turned into a probe.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client configuration cannot be used to build a client.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl WafError {
    pub(crate) fn transport(stage: Stage, source: impl Into<BoxError>) -> Self {
        WafError::Transport {
            stage,
            source: source.into(),
        }
    }

    /// True when the failure happened on the network and a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WafError::Transport { .. })
    }

    /// The transport stage for transport errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WafError::Transport { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
