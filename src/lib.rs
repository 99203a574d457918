//! WAF detection client library.
//!
//! Forwards buffered HTTP requests to an external detection backend over
//! caller-dialed connections, decodes the pass/block verdict, and probes the
//! backend's liveness endpoint. A mock backend is included for testing.

pub mod config;
pub mod detect;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod mock;
pub mod net;
pub mod observability;

pub use config::schema::WafConfig;
pub use detect::{DetectResult, Verdict, WafClient, WafResult};
pub use error::{Stage, WafError};
pub use health::{health_check, HealthStatus};
pub use net::{BackendConnection, ConnectionFactory, TcpConnectionFactory};
