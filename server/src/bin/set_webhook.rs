//! One-shot Telegram webhook registration.
//!
//! Run during deploys so the bot receives updates as soon as the server is up:
//! `TELEGRAM_BOT_TOKEN=... IPN_SECRET_KEY=... WEBHOOK_URL=https://host set-webhook`

use anyhow::{bail, Context, Result};
use tracing::info;

use stars_server::bot::{register_chat_webhook, TelegramClient};
use stars_server::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stars_server=info,set_webhook=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let client = TelegramClient::from_config(&config).context("Failed to build Telegram client")?;
    let Some(url) = register_chat_webhook(&client, &config)
        .await
        .context("Failed to set Telegram webhook")?
    else {
        bail!("WEBHOOK_URL must be set to register the Telegram webhook");
    };

    info!(url = %url, "Telegram webhook has been set");
    Ok(())
}
