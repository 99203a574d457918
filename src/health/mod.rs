//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Liveness exchange (active.rs):
//!     Caller-owned connection
//!     → GET /hccheck, Host = peer address, Connection: close
//!     → Read one response
//!     → types.rs (decode {"result_flag", "msg"})
//!     → Ok(HealthStatus) only for flag 0
//!
//! Monitoring (active.rs):
//!     Periodic timer → HealthProbe (dial + bounded exchange)
//!     → HealthMonitor state: Healthy ←→ Unhealthy with thresholds
//! ```
//!
//! # Design Decisions
//! - Independent of the detection client's pool and lifecycle
//! - Every non-zero flag is a failure, known or not

pub mod active;
pub mod types;

pub use active::{health_check, health_check_path, HealthMonitor, HealthProbe};
pub use types::{HealthFlag, HealthStatus};
