//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! SIGTERM/SIGINT (signals.rs)
//!     → Shutdown::trigger (shutdown.rs, broadcast)
//!     → MockWafServer stops accepting, drains
//!     → HealthMonitor loop exits
//!     → WafClient::shutdown drains in-flight detections
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
