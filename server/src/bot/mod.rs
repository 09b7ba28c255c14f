//! Telegram Bot
//!
//! Conversation engine for the buy/sell Stars flow.

pub mod conversation;
pub mod engine;
pub mod handlers;
pub mod messages;
pub mod sessions;
pub mod telegram;

pub use engine::{Engine, EngineError, EngineHandle, EngineTask};
pub use telegram::{register_chat_webhook, ChatApi, TelegramClient};
