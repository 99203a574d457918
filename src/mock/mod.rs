//! Mock detection backend for integration testing.
//!
//! # Data Flow
//! ```text
//! POST /detect  → event id from correlation header → random or fixed verdict
//! GET /hccheck  → random or fixed health flag
//! ```
//!
//! Verdicts from this server carry no meaning; it exists to exercise the
//! wire contract of the client and the prober.

pub mod server;

pub use server::{MockStats, MockWafServer};
