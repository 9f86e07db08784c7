//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after input validation):
//!     → rate_limit.rs (per-route, per-client token bucket)
//!     → backend call
//! ```
//!
//! # Design Decisions
//! - Invalid input is rejected before it can consume quota
//! - Limits are in-memory and per process
//! - Client identity is the peer IP, or the last X-Forwarded-For hop when trusted

pub mod rate_limit;

pub use rate_limit::{Endpoint, Quota, RateLimiter};
