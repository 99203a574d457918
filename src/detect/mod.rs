//! Detection subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (fully buffered) + correlation id
//!     → probe.rs (dump request, wrap in POST /detect)
//!     → client.rs (semaphore slot, pooled connection, request timeout)
//!     → backend
//!     → types.rs (decode {"event_id", "result_flag"} into a Verdict)
//!     → caller
//! ```
//!
//! # Design Decisions
//! - Verdict decoding is binary: flag 0 is Pass, everything else is Block
//! - Non-200 responses are never decoded
//! - No retries; callers own retry and circuit-breaking policy

pub mod client;
pub mod probe;
pub mod types;

pub use client::WafClient;
pub use types::{DetectResult, Verdict, WafResult};
