//! HTTP server for the relay
//!
//! Routes:
//! - `/health` for liveness checks
//! - `/` and the configured path for the relay itself (any method; the
//!   handler answers OPTIONS and rejects everything but POST)

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, CorsConfig};
use crate::error::{RelayError, Result};
use crate::upstream::GeminiClient;

use super::cors::apply_cors;
use super::service::Relay;
use super::types::{AskRequest, RelayResponse, ReplyEnvelope};

/// Largest request body the relay reads (matches axum's default extractor limit)
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state for all handlers
pub struct AppState {
    pub relay: Relay,
    pub cors: Arc<CorsConfig>,
    /// Route the relay is mounted on, besides "/"
    pub path: String,
}

impl AppState {
    pub fn new(config: &Config, relay: Relay) -> Self {
        let path = config.server.path.trim();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            relay,
            cors: Arc::new(config.cors.clone()),
            path,
        }
    }
}

/// The relay server
pub struct RelayServer {
    config: Config,
}

impl RelayServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start the server and listen until Ctrl+C / SIGTERM
    pub async fn serve(&self) -> Result<()> {
        self.config.validate()?;

        let upstream = Arc::new(GeminiClient::new(&self.config.upstream)?);
        let relay = Relay::new(&self.config, upstream);
        let state = Arc::new(AppState::new(&self.config, relay));

        let app = create_router(state);

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| RelayError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Relay mounted at / and {}", self.config.server.path);
        tracing::info!("CORS allow-origin policy: {:?}", self.config.cors.allow_origin);
        tracing::info!(
            "Retry policy: {} retries, first delay {}ms",
            self.config.retry.max_retries,
            self.config.retry.initial_delay_ms
        );

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Server(format!("Failed to bind to {addr}: {e}")))?;
        tracing::info!("Listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RelayError::Server(format!("Server error: {e}")))?;

        tracing::info!("Relay server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut relay_routes = Router::new().route("/", any(ask_handler));
    if state.path != "/" {
        relay_routes = relay_routes.route(&state.path, any(ask_handler));
    }
    let relay_routes =
        relay_routes.route_layer(middleware::from_fn_with_state(state.cors.clone(), apply_cors));

    relay_routes
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Relay endpoint: preflight, method guard, then the relay itself
///
/// The body is only read for POST, so preflight and rejected methods never
/// depend on its size.
async fn ask_handler(State(state): State<Arc<AppState>>, method: Method, body: Body) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    if method != Method::POST {
        tracing::debug!("Rejecting {method} request");
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST")],
            Json(ReplyEnvelope::Error("Method not allowed".to_string())),
        )
            .into_response();
    }

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Rejecting request body: {e}");
            return RelayResponse::error(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds {MAX_BODY_BYTES} bytes"),
            )
            .into_response();
        }
    };

    let request = AskRequest::from_body(&body);
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("relay", %request_id);

    state.relay.ask(&request).instrument(span).await.into_response()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OriginPolicy;
    use crate::testing::ScriptedUpstream;
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state(upstream: Arc<ScriptedUpstream>) -> Arc<AppState> {
        let config = Config::default();
        let relay = Relay::new(&config, upstream);
        Arc::new(AppState::new(&config, relay))
    }

    #[tokio::test]
    async fn test_health_check() {
        let upstream = Arc::new(ScriptedUpstream::replying("unused"));
        let app = create_router(create_test_state(upstream));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(body_str.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_options_on_configured_path() {
        let upstream = Arc::new(ScriptedUpstream::replying("unused"));
        let app = create_router(create_test_state(upstream.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/ask")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body_bytes.is_empty());
        assert_eq!(upstream.call_count(), 0);
    }

    fn oversized_request(method: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/api/ask")
            .body(Body::from(vec![b' '; MAX_BODY_BYTES + 1]))
            .unwrap()
    }

    #[tokio::test]
    async fn test_oversized_body_does_not_mask_method_handling() {
        let upstream = Arc::new(ScriptedUpstream::replying("unused"));

        let response = create_router(create_test_state(upstream.clone()))
            .oneshot(oversized_request("GET"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");

        let response = create_router(create_test_state(upstream.clone()))
            .oneshot(oversized_request("OPTIONS"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_post_gets_error_envelope() {
        let upstream = Arc::new(ScriptedUpstream::replying("unused"));
        let app = create_router(create_test_state(upstream.clone()));

        let response = app.oneshot(oversized_request("POST")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let envelope: ReplyEnvelope = serde_json::from_slice(&body_bytes).unwrap();
        assert!(matches!(envelope, ReplyEnvelope::Error(ref m) if m.contains("exceeds")));
        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_serve_rejects_invalid_exact_origin() {
        let mut config = Config::default();
        config.server.listen_addr = "127.0.0.1:0".to_string();
        config.cors.allow_origin = OriginPolicy::Exact("bad\norigin".to_string());

        let err = RelayServer::new(config).serve().await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let upstream = Arc::new(ScriptedUpstream::replying("unused"));
        let app = create_router(create_test_state(upstream));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/somewhere/else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_root_path_config_does_not_double_register() {
        let mut config = Config::default();
        config.server.path = "/".to_string();
        let relay = Relay::new(&config, Arc::new(ScriptedUpstream::replying("unused")));
        let app = create_router(Arc::new(AppState::new(&config, relay)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
