//! HTTP API gateway for NeuroChat.
//!
//! Exposes the REST surface of the backend: registration and login,
//! chat sessions and the message pipeline, and the monitoring routes.
//! Built on Axum.
//!
//! Security layers applied:
//! - Bearer-token authentication on all protected routes
//! - CORS restricted to the configured origin
//! - Request body size limit (1 MB)
//! - HTTP trace logging

pub mod api;
pub mod auth;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use neurochat_config::AppConfig;
use neurochat_engine::{ContextLimits, GenerationEngine};
use neurochat_storage::{ChatStore, SqliteStore};
use neurochat_telemetry::TelemetryEngine;

use auth::TokenSigner;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub store: Arc<dyn ChatStore>,
    pub engine: Arc<GenerationEngine>,
    pub telemetry: Arc<TelemetryEngine>,
    pub tokens: TokenSigner,
    pub start_time: DateTime<Utc>,
}

pub type SharedState = Arc<GatewayState>;

/// Assemble the shared state from its parts.
pub fn build_state(
    config: AppConfig,
    store: Arc<dyn ChatStore>,
    engine: GenerationEngine,
) -> SharedState {
    let tokens = TokenSigner::new(&config.auth.token_secret, config.auth.token_ttl_minutes);
    Arc::new(GatewayState {
        store,
        engine: Arc::new(engine),
        telemetry: Arc::new(TelemetryEngine::new()),
        tokens,
        start_time: Utc::now(),
        config,
    })
}

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState) -> Router {
    let public = Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/status", get(api::status_handler))
        .route("/api/auth/register", post(api::register_handler))
        .route("/api/auth/login", post(api::login_handler))
        .route(
            "/api/monitoring/metrics",
            post(api::add_metric_handler).get(api::list_metrics_handler),
        );

    let protected = Router::new()
        .route(
            "/api/auth/me",
            get(api::me_handler),
        )
        .route(
            "/api/auth/delete",
            axum::routing::delete(api::delete_account_handler),
        )
        .route("/api/chat/session", post(api::create_session_handler))
        .route("/api/chat/sessions", get(api::list_sessions_handler))
        .route(
            "/api/chat/session/{id}",
            get(api::session_history_handler).delete(api::delete_session_handler),
        )
        .route("/api/chat/message", post(api::post_message_handler))
        .route("/api/monitoring/logs", get(api::list_logs_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // CORS: only the configured origin; credentials allowed for the
    // cookie-less bearer flow.
    let cors = match state.config.gateway.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(origin)),
        Err(_) => {
            warn!(
                origin = %state.config.gateway.allowed_origin,
                "Invalid allowed_origin; CORS will refuse cross-origin requests"
            );
            CorsLayer::new()
        }
    }
    .allow_methods([
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::DELETE,
    ])
    .allow_headers([
        axum::http::header::CONTENT_TYPE,
        axum::http::header::AUTHORIZATION,
    ])
    .max_age(std::time::Duration::from_secs(3600));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Context-assembly limits derived from the gateway's configuration.
pub fn context_limits(state: &GatewayState) -> ContextLimits {
    ContextLimits::from(&state.config.context)
}

/// Start the gateway HTTP server.
///
/// Loads the model once (a failed load leaves the engine unavailable
/// but the server running), opens the store, and serves until a
/// shutdown signal arrives; in-flight requests are allowed to finish.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = SqliteStore::new(&config.storage.db_path).await?;
    let engine = GenerationEngine::load(&config).await;
    let state = build_state(config, Arc::new(store), engine);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("NeuroChat gateway listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received; finishing in-flight requests");
}
