//! HTTP gateway for controlling a Music Player Daemon.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod mpd;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
