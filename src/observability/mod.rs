//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client, prober and mock server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber (binaries only)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Correlation id is attached to every detection log event
//! - Metrics are recorded unconditionally; exposition is opt-in

pub mod logging;
pub mod metrics;
