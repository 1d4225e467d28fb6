//! HTTP server for the image reproduce UI
//!
//! Routes:
//! - `/api/*` JSON and SSE endpoints backed by the upstream client
//! - `/health` liveness probe
//! - everything else served from the static directory

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{ReproduceError, Result};
use crate::upstream::ChatUpstream;

use super::handlers::{
    analyze_handler, generate_handler, health_handler, models_handler, prompts_handler,
    random_image_handler,
};

/// Shared application state for all handlers
///
/// Immutable after startup; requests share nothing mutable.
pub struct AppState {
    /// Full service configuration
    pub config: Config,
    /// Chat-completions backend
    pub upstream: Arc<dyn ChatUpstream>,
    /// HTTP client for non-LLM fetches (random image)
    pub http: reqwest::Client,
    /// Ceiling applied to each outbound call
    pub upstream_timeout: Duration,
}

impl AppState {
    pub fn new(config: Config, upstream: Arc<dyn ChatUpstream>, http: reqwest::Client) -> Self {
        let upstream_timeout = Duration::from_secs(config.upstream.timeout_secs);
        Self {
            config,
            upstream,
            http,
            upstream_timeout,
        }
    }
}

/// The main HTTP server
pub struct ReproduceServer {
    state: Arc<AppState>,
}

impl ReproduceServer {
    pub fn new(config: Config, upstream: Arc<dyn ChatUpstream>, http: reqwest::Client) -> Self {
        Self {
            state: Arc::new(AppState::new(config, upstream, http)),
        }
    }

    /// Bind and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let config = &self.state.config;
        let addr: SocketAddr = config.server.listen_addr.parse().map_err(|e| {
            ReproduceError::Configuration(format!("Invalid listen address: {e}"))
        })?;

        tracing::info!("Starting server on {addr}");
        tracing::info!("Upstream: {} ({})", config.upstream.base_url, self.state.upstream.name());
        tracing::info!("Serving static files from {}", config.server.static_dir.display());
        if !config.server.static_dir.is_dir() {
            tracing::warn!(
                "Static directory {} does not exist",
                config.server.static_dir.display()
            );
        }

        let app = create_router(self.state.clone());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ReproduceError::Configuration(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
///
/// The static file service is the fallback so API routes always win.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/prompts", get(prompts_handler))
        .route("/api/models", get(models_handler))
        .route("/api/random-image", get(random_image_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/generate", post(generate_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
    use crate::testing::ScriptedUpstream;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn create_test_state(static_dir: &std::path::Path) -> Arc<AppState> {
        let mut config = Config::default();
        config.server.static_dir = static_dir.to_path_buf();
        Arc::new(AppState::new(
            config,
            Arc::new(ScriptedUpstream::new()),
            reqwest::Client::new(),
        ))
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()));

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

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(body_str.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_static_fallback_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>ui</h1>").unwrap();
        let app = create_router(create_test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>ui</h1>");
    }

    #[tokio::test]
    async fn test_static_fallback_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nope.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_routes_take_priority_over_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        std::fs::write(dir.path().join("api").join("models"), "static").unwrap();

        let mut config = Config::default();
        config.server.static_dir = dir.path().to_path_buf();
        config.assets.models_file = dir.path().join("missing-models.toml");
        let state = Arc::new(AppState::new(
            config,
            Arc::new(ScriptedUpstream::new()),
            reqwest::Client::new(),
        ));

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
