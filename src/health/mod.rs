//! Backend liveness probe.
//!
//! One connection attempt (no retries), a `ping`, then close. The result is
//! reported as-is so the caller can see why the backend is unreachable.

use serde::Serialize;

use crate::net::ConnectionManager;

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthReport {
    Ok { service: &'static str },
    Error { message: String },
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthReport::Ok { .. })
    }
}

/// Probe the backend once.
pub async fn probe(connections: &ConnectionManager) -> HealthReport {
    let result = match connections.acquire().await {
        Ok(mut conn) => {
            let ping = conn.ping().await;
            conn.release().await;
            ping
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => HealthReport::Ok { service: "MPD" },
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            HealthReport::Error {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_with_status_tag() {
        let ok = serde_json::to_value(HealthReport::Ok { service: "MPD" }).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "ok", "service": "MPD"}));

        let err = serde_json::to_value(HealthReport::Error {
            message: "refused".into(),
        })
        .unwrap();
        assert_eq!(err, serde_json::json!({"status": "error", "message": "refused"}));
    }
}
