//! Payment Notification Types
//!
//! IPN payloads, payment statuses and the errors surfaced at the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Payment lifecycle states reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    /// A status this server does not know about.
    Other(String),
}

impl PaymentStatus {
    /// Parse from the processor's wire form (e.g., `"partially_paid"`).
    pub fn parse_str(s: &str) -> Self {
        match s {
            "waiting" => Self::Waiting,
            "confirming" => Self::Confirming,
            "confirmed" => Self::Confirmed,
            "sending" => Self::Sending,
            "partially_paid" => Self::PartiallyPaid,
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            "expired" => Self::Expired,
            other => Self::Other(other.to_string()),
        }
    }

    /// Convert to the wire form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Waiting => "waiting",
            Self::Confirming => "confirming",
            Self::Confirmed => "confirmed",
            Self::Sending => "sending",
            Self::PartiallyPaid => "partially_paid",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_str(&raw))
    }
}

/// Inbound IPN body. Only the fields this server acts on are typed.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    pub payment_status: PaymentStatus,
}

/// Processors are inconsistent about quoting ids; accept both forms.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for order_id, got {other}"
        ))),
    }
}

/// What the dispatcher did with a verified notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A fulfillment-processing task was queued on the bot engine.
    Scheduled { order_id: String },
    /// Acknowledged without action.
    Ignored { status: PaymentStatus },
}

/// Payment webhook errors.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Missing x-signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("Bot engine is not running")]
    EngineNotReady,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::MissingSignature => (
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                self.to_string(),
            ),
            Self::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SIGNATURE",
                self.to_string(),
            ),
            Self::MalformedPayload(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MALFORMED_PAYLOAD",
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
