//! Error types for the MPD client.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A command rejected by the server (`ACK [code@index] {command} message`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckError {
    /// MPD error code (e.g. 50 = no such song, 3 = wrong password).
    pub code: u32,
    /// Index of the failing command within a command list.
    pub index: u32,
    /// Name of the command that failed.
    pub command: String,
    /// Human readable message from the server.
    pub message: String,
}

impl AckError {
    /// Parse the part of an `ACK` line that follows the `ACK ` prefix.
    pub fn parse(rest: &str) -> Option<Self> {
        let rest = rest.strip_prefix('[')?;
        let (position, rest) = rest.split_once(']')?;
        let (code, index) = position.split_once('@')?;
        let rest = rest.trim_start().strip_prefix('{')?;
        let (command, message) = rest.split_once('}')?;

        Some(Self {
            code: code.parse().ok()?,
            index: index.parse().ok()?,
            command: command.to_string(),
            message: message.trim_start().to_string(),
        })
    }
}

impl fmt::Display for AckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}@{}] {{{}}} {}", self.code, self.index, self.command, self.message)
    }
}

/// Errors that can occur while talking to an MPD server.
#[derive(Debug, Error)]
pub enum MpdError {
    /// Socket level failure (refused, reset, broken pipe).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server did not answer within the configured deadline.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// The server rejected a command.
    #[error("{0}")]
    Ack(AckError),

    /// The server sent something that is not valid MPD protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    Closed,
}

/// Convenience result alias for MPD operations.
pub type MpdResult<T> = Result<T, MpdError>;
