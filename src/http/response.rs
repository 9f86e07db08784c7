//! Mapping of failures to JSON HTTP responses.
//!
//! Every error body has the shape `{"error": "<message>"}`. Backend
//! internals are logged where they happen, not echoed beyond the message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::resilience::ExecuteError;

/// API error type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Missing, malformed or out-of-range parameter (400).
    #[error("{0}")]
    BadRequest(&'static str),

    /// Per-route quota exhausted (429).
    #[error("Rate limit exceeded")]
    RateLimited,

    /// No backend connection within the retry bound (503).
    #[error("Could not connect to music server")]
    Unavailable,

    /// Backend rejected the operation (500).
    #[error("{0}")]
    Backend(String),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The whole request exceeded `timeouts.request_secs` (408).
    #[error("Request timed out")]
    Timeout,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Backend(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<ExecuteError> for ApiError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::Unavailable { .. } => ApiError::Unavailable,
            ExecuteError::Backend(e) => ApiError::Backend(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpd::{AckError, MpdError};

    #[test]
    fn execute_errors_map_to_status() {
        let unavailable = ApiError::from(ExecuteError::Unavailable {
            attempts: 3,
            last_error: None,
        });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.to_string(), "Could not connect to music server");

        let ack = AckError::parse("[50@0] {play} song doesn't exist: \"10\"").unwrap();
        let backend = ApiError::from(ExecuteError::Backend(MpdError::Ack(ack)));
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.to_string(), "[50@0] {play} song doesn't exist: \"10\"");
    }

    #[tokio::test]
    async fn body_is_error_object() {
        let response = ApiError::BadRequest("Invalid volume value").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "Invalid volume value"}));
    }
}
