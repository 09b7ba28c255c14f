//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Telegram bot token
    pub telegram_bot_token: String,

    /// Telegram Bot API base URL (default: `https://api.telegram.org`)
    pub telegram_api_url: String,

    /// Public base URL of this server; `/chat-webhook` is appended when
    /// registering with Telegram. Unset means offline mode.
    pub webhook_url: Option<String>,

    /// Optional secret Telegram echoes back in `X-Telegram-Bot-Api-Secret-Token`
    pub telegram_webhook_secret: Option<String>,

    /// Shared secret for payment IPN signatures
    pub ipn_secret_key: String,

    /// Fragment automation username (optional)
    pub fragments_username: Option<String>,

    /// Fragment automation password (optional)
    pub fragments_password: Option<String>,

    /// External automation program invoked as `<cmd> <quantity> <recipient>`
    pub fulfillment_command: Option<String>,

    /// Number of concurrent fulfillment workers (default: 2)
    pub fulfillment_workers: usize,

    /// Pending fulfillment jobs before submissions are refused (default: 32)
    pub fulfillment_queue_capacity: usize,

    /// Bot engine task queue capacity (default: 1024)
    pub engine_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN must be set")?,
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".into()),
            webhook_url: non_empty_var("WEBHOOK_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            telegram_webhook_secret: non_empty_var("TELEGRAM_WEBHOOK_SECRET"),
            ipn_secret_key: env::var("IPN_SECRET_KEY").context("IPN_SECRET_KEY must be set")?,
            fragments_username: non_empty_var("FRAGMENTS_USERNAME"),
            fragments_password: non_empty_var("FRAGMENTS_PASSWORD"),
            fulfillment_command: non_empty_var("FULFILLMENT_COMMAND"),
            fulfillment_workers: env::var("FULFILLMENT_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            fulfillment_queue_capacity: env::var("FULFILLMENT_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(32),
            engine_queue_capacity: env::var("ENGINE_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1024),
        })
    }

    /// Check if Fragment automation credentials are configured.
    #[must_use]
    pub const fn has_fragments_credentials(&self) -> bool {
        self.fragments_username.is_some() && self.fragments_password.is_some()
    }

    /// Full URL Telegram should deliver updates to, if a public base URL is set.
    #[must_use]
    pub fn chat_webhook_url(&self) -> Option<String> {
        self.webhook_url
            .as_ref()
            .map(|base| format!("{base}/chat-webhook"))
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            telegram_bot_token: "123456:test-token".into(),
            telegram_api_url: "http://127.0.0.1:9".into(),
            webhook_url: None,
            telegram_webhook_secret: None,
            ipn_secret_key: "test-ipn-secret".into(),
            fragments_username: None,
            fragments_password: None,
            fulfillment_command: None,
            fulfillment_workers: 2,
            fulfillment_queue_capacity: 32,
            engine_queue_capacity: 64,
        }
    }
}

/// Read an environment variable, treating an empty value as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
