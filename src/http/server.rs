//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all API handlers
//! - Serve the web UI and static assets
//! - Wire up middleware (request ID, tracing, panics, timeout, metrics)
//! - Bind to a listener and shut down gracefully

use std::any::Any;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::request::{self, ClientIp, UuidRequestId};
use crate::http::response::ApiError;
use crate::net::ConnectionManager;
use crate::observability::metrics;
use crate::resilience::{RetryPolicy, RetryWrapper};
use crate::security::{Endpoint, RateLimiter};

/// Application state injected into handlers.
///
/// Built once at startup; handlers only read it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub connections: Arc<ConnectionManager>,
    pub mpd: RetryWrapper,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let connections = Arc::new(ConnectionManager::new(
            config.backend.clone(),
            &config.timeouts,
        ));
        let mpd = RetryWrapper::new(connections.clone(), RetryPolicy::from(&config.retries));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config: Arc::new(config),
            connections,
            mpd,
            limiter,
        }
    }

    /// Spend one rate-limit token for `client` on `endpoint`.
    pub fn limit(&self, endpoint: Endpoint, client: IpAddr) -> Result<(), ApiError> {
        if self.limiter.check(endpoint, client) {
            Ok(())
        } else {
            Err(ApiError::RateLimited)
        }
    }
}

/// HTTP front end for the MPD gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState::new(config);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let static_dir = PathBuf::from(&state.config.static_files.dir);
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let api = Router::new()
            .route("/status", get(handlers::status))
            .route("/play", post(handlers::play))
            .route("/pause", post(handlers::pause))
            .route("/stop", post(handlers::stop))
            .route("/next", post(handlers::next))
            .route("/previous", post(handlers::previous))
            .route("/seek", post(handlers::seek))
            .route("/volume", post(handlers::set_volume))
            .route("/playlist", get(handlers::playlist))
            .route("/playlist/add", post(handlers::playlist_add))
            .route("/playlist/addplay", post(handlers::playlist_addplay))
            .route("/playlist/remove", post(handlers::playlist_remove))
            .route("/playlist/play", post(handlers::playlist_play))
            .route("/playlist/clear", post(handlers::playlist_clear))
            .route("/search", get(handlers::search))
            .route("/playlists", get(handlers::playlists))
            .route("/random", post(handlers::toggle_random))
            .route("/repeat", post(handlers::toggle_repeat))
            .route("/health", get(handlers::health));

        let ui = Router::new()
            .route_service("/", ServeFile::new(static_dir.join("index.html")))
            .nest_service("/static", ServeDir::new(static_dir))
            .route_layer(middleware::from_fn_with_state(state.clone(), limit_ui));

        Router::new()
            .nest("/api", api)
            .merge(ui)
            .fallback(handlers::not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .with_state(state)
            .layer(middleware::from_fn(track_requests))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_timeout))
                    .timeout(request_timeout),
            )
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request::request_id(req.headers()),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %format!("{}:{}", self.state.config.backend.host, self.state.config.backend.port),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Record per-route request metrics.
async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}

/// Apply the default quotas to the UI page and static assets.
async fn limit_ui(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.limit(Endpoint::Ui, client)?;
    Ok(next.run(request).await)
}

async fn handle_timeout(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::Timeout
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        ApiError::Internal
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::Internal.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{self, StatusCode};
    use tower::ServiceExt;

    fn server() -> GatewayServer {
        let mut config = GatewayConfig::default();
        config.backend.host = "127.0.0.1".into();
        config.backend.port = 1;
        config.retries.base_delay_ms = 0;
        GatewayServer::new(config)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let response = server()
            .router()
            .oneshot(http::Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(request::X_REQUEST_ID));
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"error": "Endpoint not found"})
        );
    }

    #[tokio::test]
    async fn validation_runs_without_peer_address() {
        let request = http::Request::post("/api/volume")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("volume=250"))
            .unwrap();
        let response = server().router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"error": "Invalid volume value"})
        );
    }

    #[tokio::test]
    async fn panics_become_json_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"error": "Internal server error"})
        );
    }

    #[test]
    fn limit_maps_to_rate_limited() {
        let mut config = GatewayConfig::default();
        config.rate_limit.routes.insert(
            "playlist_clear".into(),
            crate::security::Quota::per_minute(1),
        );
        let state = AppState::new(config);
        let client: IpAddr = "192.0.2.1".parse().unwrap();

        assert_eq!(state.limit(Endpoint::PlaylistClear, client), Ok(()));
        assert_eq!(
            state.limit(Endpoint::PlaylistClear, client),
            Err(ApiError::RateLimited)
        );
    }
}
