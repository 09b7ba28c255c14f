//! Payment IPN Handler

use axum::{extract::State, http::HeaderMap};
use bytes::Bytes;
use tracing::{error, info, instrument, warn};

use super::types::{DispatchOutcome, PaymentError, PaymentNotification};
use super::{dispatch, signing};
use crate::api::AppState;

/// Header carrying the hex HMAC-SHA512 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// POST /payment-ipn
///
/// The body is taken as raw bytes: the signature covers exactly what was
/// sent, so it must be checked before any JSON parsing.
#[instrument(skip_all)]
pub async fn payment_ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, PaymentError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or_else(|| {
            warn!("Payment notification without signature header");
            PaymentError::MissingSignature
        })?
        .to_str()
        .map_err(|_| {
            warn!("Payment notification signature is not valid ASCII");
            PaymentError::InvalidSignature
        })?;

    if !signing::verify_signature(&state.config.ipn_secret_key, &body, signature) {
        warn!(body_len = body.len(), "Payment notification signature mismatch");
        return Err(PaymentError::InvalidSignature);
    }

    let notification: PaymentNotification = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "Signed payment notification could not be decoded");
        PaymentError::MalformedPayload(e)
    })?;

    match dispatch::dispatch_notification(&state.engine, &body, notification).await? {
        DispatchOutcome::Scheduled { order_id } => {
            info!(order_id = %order_id, "Payment processing scheduled");
        }
        DispatchOutcome::Ignored { status } => {
            info!(payment_status = %status, "Payment notification acknowledged without action");
        }
    }

    Ok("OK")
}
