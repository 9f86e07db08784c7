//! Timeout enforcement.
//!
//! Every socket operation against the backend carries a deadline. A timeout
//! is reported as [`MpdError::Timeout`], distinct from I/O failures.

use std::future::Future;
use std::time::Duration;

use crate::mpd::error::{MpdError, MpdResult};

/// Run `fut`, failing with [`MpdError::Timeout`] if it outlives `limit`.
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> MpdResult<T>
where
    F: Future<Output = MpdResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MpdError::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}
