//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → server.rs (request ID, tracing, panic guard, timeout, metrics)
//!     → handlers.rs
//!         → params.rs (validate form/query fields)
//!         → request.rs (client IP) → rate limiter
//!         → retry wrapper → MPD
//!     → response.rs (JSON body, status code)
//! ```

pub mod handlers;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientIp, UuidRequestId, X_REQUEST_ID};
pub use response::{ApiError, ApiResult};
pub use server::{AppState, GatewayServer};
