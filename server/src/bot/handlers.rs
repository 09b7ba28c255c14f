//! Chat Webhook Handler
//!
//! Receives Telegram updates and hands them to the bot engine. Processing
//! happens on the engine task, not on the request.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use super::engine::EngineTask;
use super::telegram::{Update, SECRET_TOKEN_HEADER};
use crate::api::AppState;
use crate::payments::signing::constant_time_eq;

/// Chat webhook errors.
#[derive(Error, Debug)]
pub enum ChatWebhookError {
    #[error("Invalid secret token")]
    InvalidSecretToken,
    #[error("Malformed update: {0}")]
    MalformedUpdate(#[from] serde_json::Error),
    #[error("Bot engine is not running")]
    EngineNotReady,
}

impl IntoResponse for ChatWebhookError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::InvalidSecretToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SECRET_TOKEN",
                self.to_string(),
            ),
            Self::MalformedUpdate(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MALFORMED_UPDATE",
                self.to_string(),
            ),
            Self::EngineNotReady => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ENGINE_NOT_READY",
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// POST /chat-webhook
#[instrument(skip_all)]
pub async fn chat_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ChatWebhookError> {
    if let Some(expected) = state.config.telegram_webhook_secret.as_deref() {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if !constant_time_eq(expected.as_bytes(), provided) {
            warn!("Chat webhook called with a bad secret token");
            return Err(ChatWebhookError::InvalidSecretToken);
        }
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        warn!("Received empty body on chat webhook, ignoring");
        return Ok("OK");
    }

    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "Failed to decode chat update");
        ChatWebhookError::MalformedUpdate(e)
    })?;
    debug!(update_id = update.update_id, "Chat update received");

    state
        .engine
        .schedule(EngineTask::Update(Box::new(update)))
        .await
        .map_err(|e| {
            error!(error = %e, "Chat update arrived but the bot engine is not running");
            ChatWebhookError::EngineNotReady
        })?;

    Ok("OK")
}
