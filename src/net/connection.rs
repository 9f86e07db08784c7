//! Backend connection lifecycle.
//!
//! # Responsibilities
//! - Open one fresh MPD connection per request (never pooled)
//! - Authenticate when a password is configured
//! - Track live connections so release on every path is observable
//! - Close the connection when the request is done with it

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendConfig, TimeoutConfig};
use crate::mpd::{MpdConnection, MpdResult};
use crate::observability::metrics;

/// Source of connection IDs. Only uniqueness matters, so ordering is relaxed.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mpd-{}", self.0)
    }
}

/// Counts live backend connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current live connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Backend connection released");
    }
}

/// A live, authenticated backend connection owned by one request.
///
/// Dereferences to [`MpdConnection`]. If it is dropped without
/// [`release`](ManagedConnection::release) (e.g. the request future was
/// cancelled) the socket is still closed and the tracker still decremented.
#[derive(Debug)]
pub struct ManagedConnection {
    conn: MpdConnection,
    guard: ConnectionGuard,
}

impl ManagedConnection {
    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    /// Close the connection. Failures are logged, never propagated.
    pub async fn release(self) {
        let id = self.guard.id();
        if let Err(e) = self.conn.close().await {
            tracing::debug!(connection_id = %id, error = %e, "Backend close failed");
        }
    }
}

impl Deref for ManagedConnection {
    type Target = MpdConnection;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for ManagedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// Opens backend connections on demand.
#[derive(Debug)]
pub struct ConnectionManager {
    backend: BackendConfig,
    connect_timeout: Duration,
    io_timeout: Duration,
    tracker: ConnectionTracker,
}

impl ConnectionManager {
    pub fn new(backend: BackendConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            backend,
            connect_timeout: Duration::from_secs(timeouts.connect_secs),
            io_timeout: Duration::from_secs(timeouts.io_secs),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Connect and, if configured, authenticate.
    ///
    /// Any error here is a connection failure: the caller may retry.
    pub async fn acquire(&self) -> MpdResult<ManagedConnection> {
        let conn = match MpdConnection::connect(
            &self.backend.host,
            self.backend.port,
            self.connect_timeout,
            self.io_timeout,
        )
        .await
        {
            Ok(conn) => conn,
            Err(e) => {
                metrics::record_backend_connect("error");
                return Err(e);
            }
        };

        let mut managed = ManagedConnection {
            conn,
            guard: self.tracker.track(),
        };

        if let Some(password) = self.backend.password.as_deref() {
            if let Err(e) = managed.password(password).await {
                tracing::warn!(
                    connection_id = %managed.id(),
                    host = %self.backend.host,
                    port = self.backend.port,
                    error = %e,
                    "MPD authentication failed"
                );
                metrics::record_backend_connect("auth_failed");
                managed.release().await;
                return Err(e);
            }
        }

        metrics::record_backend_connect("ok");
        tracing::debug!(
            connection_id = %managed.id(),
            host = %self.backend.host,
            port = self.backend.port,
            version = %managed.server_version(),
            "Connected to MPD"
        );
        Ok(managed)
    }

    /// Number of backend connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}
