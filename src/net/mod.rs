//! Backend networking.
//!
//! # Data Flow
//! ```text
//! Handler operation
//!     → connection.rs (connect, greet, authenticate)
//!     → ManagedConnection (owned by exactly one request)
//!     → release (close) on success, error, or drop
//! ```
//!
//! # Design Decisions
//! - One connection per request; nothing is pooled or shared
//! - Release is tied to ownership, so no exit path can leak a socket

pub mod connection;

pub use connection::{ConnectionManager, ConnectionTracker, ManagedConnection};
