//! Payment Event Dispatch
//!
//! Turns a verified notification into work for the bot engine. Only
//! `finished` payments are acted on; the task is queued, never run inline,
//! so the processor gets its response without waiting on the bot.

use tracing::{error, info};

use super::types::{DispatchOutcome, PaymentError, PaymentNotification, PaymentStatus};
use crate::bot::{EngineHandle, EngineTask};

/// Dispatch a verified notification.
///
/// Repeated notifications for the same order are scheduled every time; the
/// engine's order ledger makes the processing itself idempotent.
pub async fn dispatch_notification(
    engine: &EngineHandle,
    raw_payload: &[u8],
    notification: PaymentNotification,
) -> Result<DispatchOutcome, PaymentError> {
    info!(
        order_id = %notification.order_id,
        payment_status = %notification.payment_status,
        payload = %String::from_utf8_lossy(raw_payload),
        "Payment notification received"
    );

    if notification.payment_status != PaymentStatus::Finished {
        return Ok(DispatchOutcome::Ignored {
            status: notification.payment_status,
        });
    }

    let order_id = notification.order_id;
    engine
        .schedule(EngineTask::ProcessPayment {
            order_id: order_id.clone(),
        })
        .await
        .map_err(|e| {
            error!(order_id = %order_id, error = %e, "Cannot schedule payment processing");
            PaymentError::EngineNotReady
        })?;

    Ok(DispatchOutcome::Scheduled { order_id })
}
