//! MPD protocol client.
//!
//! # Data Flow
//! ```text
//! Command (name + args)
//!     → codec.rs (quote, encode as one line)
//!     → TCP socket
//!     → codec.rs (decode reply lines)
//!     → connection.rs (collect pairs until OK / ACK)
//!     → reply.rs (pairs → JSON records)
//! ```
//!
//! Only the commands the HTTP API needs are implemented.

pub mod codec;
pub mod connection;
pub mod error;
pub mod reply;

pub use codec::{Command, MpdCodec, ReplyLine};
pub use connection::MpdConnection;
pub use error::{AckError, MpdError, MpdResult};
pub use reply::Record;
