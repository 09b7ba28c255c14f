//! Payment Processor Webhooks
//!
//! IPN (Instant Payment Notification) receiver: HMAC-SHA512 verification of
//! the raw body, then dispatch of finished payments to the bot engine.

pub mod dispatch;
pub mod handlers;
pub mod signing;
pub mod types;

pub use types::{DispatchOutcome, PaymentError, PaymentNotification, PaymentStatus};
