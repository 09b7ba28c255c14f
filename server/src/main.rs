//! Stars Trader Server - Main Entry Point

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use stars_server::bot::{self, Engine, TelegramClient};
use stars_server::fulfillment::{self, FulfillmentPool};
use stars_server::{api, config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stars_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Stars Trader Server"
    );

    // Telegram client
    let telegram = Arc::new(
        TelegramClient::from_config(&config).context("Failed to build Telegram client")?,
    );

    // Fulfillment workers
    let invoker = fulfillment::invoker::from_config(&config);
    let pool = FulfillmentPool::spawn(
        invoker,
        config.fulfillment_workers,
        config.fulfillment_queue_capacity,
    );
    info!(
        workers = config.fulfillment_workers,
        capacity = config.fulfillment_queue_capacity,
        fragments_configured = config.has_fragments_credentials(),
        "Fulfillment pool started"
    );

    // Bot engine
    let (engine, engine_handle) =
        Engine::new(telegram.clone(), pool, config.engine_queue_capacity);
    let engine_task = engine.spawn();

    // Register the chat webhook (optional - offline mode if no public URL)
    match bot::register_chat_webhook(telegram.as_ref(), &config).await {
        Ok(Some(url)) => info!(url = %url, "Telegram webhook registered"),
        Ok(None) => warn!("WEBHOOK_URL is not set. Skipping Telegram webhook registration."),
        Err(e) => warn!("Failed to register Telegram webhook: {}", e),
    }

    // Build router
    let bind_address = config.bind_address.clone();
    let state = api::AppState::new(config, engine_handle);
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // The router (and its engine handle) is gone; let the engine drain.
    if let Err(e) = engine_task.await {
        warn!("Bot engine task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");

    Ok(())
}
