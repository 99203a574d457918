//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Pool needs a connection
//!     → connector.rs (FactoryConnector, handshake timeout)
//!     → current ConnectionFactory (caller-supplied dial policy)
//!     → connection.rs (BackendConnection, boxed and handed to hyper)
//!
//! Health check:
//!     caller dials a BackendConnection directly (no pool)
//! ```
//!
//! # Design Decisions
//! - The pool never resolves addresses; the factory does
//! - The factory lives in an ArcSwap slot and can be replaced live
//! - A replaced factory only affects connections dialed afterwards

pub mod connection;
pub mod connector;

pub use connection::{BackendConnection, BoxConnection, ConnectionFactory, TcpConnectionFactory};
pub use connector::{factory_slot, FactoryConnector, FactorySlot, PooledStream};
