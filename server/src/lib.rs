//! Stars Trader Server
//!
//! Telegram bot for buying and selling Stars, plus the payment processor's
//! IPN receiver. Conversation state is in-memory only.

pub mod api;
pub mod bot;
pub mod config;
pub mod fulfillment;
pub mod payments;
