//! Retry wrapper around backend operations.
//!
//! # Responsibilities
//! - Acquire a fresh connection, retrying connection failures up to a bound
//! - Run exactly one logical operation on the connection
//! - Release the connection whatever the operation's outcome
//!
//! # Design Decisions
//! - Connection failures (refused, greeting, auth, connect timeout) are retried
//! - Protocol failures are final: the connection worked, the request did not
//! - Exhausting all attempts is an explicit result, never a fall-through

use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::RetryConfig;
use crate::mpd::{MpdConnection, MpdError, MpdResult};
use crate::net::{ConnectionManager, ManagedConnection};
use crate::resilience::backoff::calculate_backoff;

/// How many times, and how patiently, to try connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Why a wrapped operation produced no result.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// No connection could be established within the attempt bound.
    #[error("could not connect to MPD after {attempts} attempt(s)")]
    Unavailable {
        attempts: u32,
        #[source]
        last_error: Option<MpdError>,
    },

    /// Connected, but the backend rejected the operation.
    #[error(transparent)]
    Backend(MpdError),
}

/// Runs operations against the backend with bounded reconnection.
#[derive(Debug, Clone)]
pub struct RetryWrapper {
    connections: Arc<ConnectionManager>,
    policy: RetryPolicy,
}

impl RetryWrapper {
    pub fn new(connections: Arc<ConnectionManager>, policy: RetryPolicy) -> Self {
        Self {
            connections,
            policy,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Run `op` on a fresh connection.
    ///
    /// `op` is invoked at most once, and only with a live connection. The
    /// connection is closed before this returns.
    pub async fn execute<T, F>(&self, operation: &'static str, op: F) -> Result<T, ExecuteError>
    where
        F: for<'c> FnOnce(&'c mut MpdConnection) -> BoxFuture<'c, MpdResult<T>>,
    {
        let mut conn = self.connect(operation).await?;
        let result = op(&mut *conn).await;
        conn.release().await;

        result.map_err(|e| {
            tracing::error!(operation, error = %e, "MPD error");
            ExecuteError::Backend(e)
        })
    }

    async fn connect(&self, operation: &'static str) -> Result<ManagedConnection, ExecuteError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.connections.acquire().await {
                Ok(conn) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Connected after retry");
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    tracing::error!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Connection error (attempt {}/{})",
                        attempt,
                        max_attempts
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        let delay = calculate_backoff(
                            attempt,
                            self.policy.base_delay_ms,
                            self.policy.max_delay_ms,
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(ExecuteError::Unavailable {
            attempts: max_attempts,
            last_error,
        })
    }
}
