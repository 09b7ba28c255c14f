//! API Router and Application State
//!
//! Central routing configuration and shared state.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{bot, bot::EngineHandle, config::Config, payments};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Handle into the running bot engine
    pub engine: EngineHandle,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(config: Config, engine: EngineHandle) -> Self {
        Self {
            config: Arc::new(config),
            engine,
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness
        .route("/", get(index))
        .route("/health", get(health_check))
        // Payment processor IPN
        .route("/payment-ipn", post(payments::handlers::payment_ipn))
        // Telegram updates
        .route("/chat-webhook", post(bot::handlers::chat_webhook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

/// Liveness string for platform health checks.
async fn index() -> &'static str {
    info!("Accessed root path / (health check)");
    "StarsExchangrBot is running!"
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether the bot engine is consuming tasks
    engine_running: bool,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        engine_running: state.engine.is_running(),
    })
}
