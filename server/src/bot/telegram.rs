//! Telegram Bot API
//!
//! The subset of update types the conversation engine reads, and a small
//! client for the two outbound calls it makes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::Config;

/// Header Telegram uses to echo the secret token registered with `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// An incoming update. Only plain messages are acted on.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Identity handed to the delivery automation: `@username` when the user
    /// has one, otherwise the numeric id.
    pub fn recipient_identity(&self) -> String {
        match &self.username {
            Some(username) if !username.is_empty() => format!("@{username}"),
            _ => self.id.to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram API errors.
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {description}")]
    Api { description: String },
}

/// Outbound calls the bot makes to the chat platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send an HTML-formatted message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;

    /// Register `url` as the update callback.
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>)
        -> Result<(), TelegramError>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    allowed_updates: &'static [&'static str],
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API client over HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TelegramError> {
        Self::new(&config.telegram_api_url, &config.telegram_bot_token)
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, body: &T) -> Result<(), TelegramError> {
        let response: ApiResponse = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(TelegramError::Api {
                description: response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            })
        }
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.call(
            "sendMessage",
            &SendMessageRequest {
                chat_id,
                text,
                parse_mode: "HTML",
            },
        )
        .await
    }

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.call(
            "setWebhook",
            &SetWebhookRequest {
                url,
                secret_token,
                allowed_updates: &["message"],
            },
        )
        .await
    }
}

/// Register this server's `/chat-webhook` with the chat platform.
///
/// Returns the registered URL, or `None` when no public base URL is
/// configured (offline mode).
pub async fn register_chat_webhook(
    chat: &dyn ChatApi,
    config: &Config,
) -> Result<Option<String>, TelegramError> {
    let Some(url) = config.chat_webhook_url() else {
        return Ok(None);
    };

    info!(url = %url, "Registering Telegram webhook");
    chat.set_webhook(&url, config.telegram_webhook_secret.as_deref()).await?;
    Ok(Some(url))
}
