//! Spotify Relay
//!
//! Single-binary service that:
//! 1. Runs the Spotify authorization-code flow (`/login`, `/callback`)
//! 2. Holds the issued tokens in memory
//! 3. Checks and refreshes the access token before every protected route
//! 4. Forwards playlist and library requests to api.spotify.com

mod auth;
mod config;
mod error;
mod guard;
mod metrics;
mod resources;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use spotify_auth::Session;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::metrics::ServiceMetrics;

/// How long in-flight requests may take to finish after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    session: Arc<Session>,
    frontend_url: url::Url,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router.
///
/// Everything except the authorization flow and the operational endpoints
/// sits behind the credential guard.
fn build_router(state: AppState, max_connections: usize, cors: CorsLayer) -> Router {
    let protected = Router::new()
        .route("/", get(resources::welcome))
        .route("/playlists", post(resources::create_playlist))
        .route("/me/playlists", get(resources::my_playlists))
        .route("/api/user-playlists", get(resources::user_playlists))
        .route("/api/user-playlists-tracks", get(resources::playlist_tracks))
        .route("/playlists/{playlist_id}/tracks", post(resources::add_tracks))
        .route("/liked-songs", get(resources::liked_songs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::credential_guard,
        ));

    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics::track_requests,
        ))
        .layer(cors)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// CORS for the browser front end; credentials (cookies) are allowed, so the
/// origin must be explicit.
fn build_cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("invalid cors_origin {origin:?}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting spotify-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using environment only"),
    }

    let config = Config::load(config_path.as_deref()).context("failed to load config")?;

    info!(
        listen_addr = %config.server.listen_addr,
        client_id = %config.spotify.client_id,
        redirect_uri = %config.spotify.redirect_uri,
        frontend_url = %config.server.frontend_url,
        "configuration loaded"
    );

    let oauth = config.oauth().context("incomplete OAuth configuration")?;
    let frontend_url = url::Url::parse(&config.server.frontend_url)
        .with_context(|| format!("invalid frontend_url {}", config.server.frontend_url))?;
    let cors = build_cors_layer(&config.server.cors_origin)?;

    let metrics = ServiceMetrics::new();
    let app_state = AppState {
        session: Arc::new(Session::new(reqwest::Client::new(), oauth)),
        frontend_url,
        metrics: metrics.clone(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections, cors);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown: the drain timer starts when the signal arrives, not
    // when the server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                requests_served = metrics.requests_total.load(Ordering::Relaxed),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: liveness plus whether a Spotify login has happened.
/// Tokens are never included.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let authorized = state.session.credentials().is_authorized().await;

    (
        axum::http::StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "healthy",
            "authorized": authorized,
            "uptime_seconds": uptime,
            "requests_served": requests,
        })
        .to_string(),
    )
}

/// Prometheus metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
