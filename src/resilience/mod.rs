//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint operation:
//!     → retries.rs (acquire connection, up to max_attempts)
//!     → backoff.rs (jittered delay between failed connects)
//!     → timeouts.rs (deadline on every socket operation)
//! ```
//!
//! # Design Decisions
//! - Only connection establishment is retried
//! - A command the backend rejects is final (500), never replayed
//! - Every external call has a deadline

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{ExecuteError, RetryPolicy, RetryWrapper};
