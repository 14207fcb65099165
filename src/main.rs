//! Dotrelay - Discord dot-event relay bot
//!
//! Watches channels where a game bridge bot posts player events and relays
//! the ones for dot-prefixed (Bedrock) players to configured channels and
//! webhooks.

mod common;
mod config;
mod discord;
mod relay;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use config::{env::get_config_path, load_and_validate};
use discord::{DiscordBotBuilder, RelayState};
use relay::RelayStats;
use store::{RouteStore, WebhookRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Dotrelay v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Command prefix: {}", config.discord.command_prefix);
    info!("  Routes file: {}", config.storage.routes_file);
    info!("  Webhooks file: {}", config.storage.webhooks_file);
    info!("  Delivery timeout: {}s", config.relay.delivery_timeout_secs);
    if let Some(channel) = config.relay.error_channel {
        info!("  Error channel: {}", channel);
    }

    let state = RelayState {
        routes: Arc::new(
            RouteStore::open(&config.storage.routes_file)
                .with_context(|| format!("opening route store {}", config.storage.routes_file))?,
        ),
        webhooks: Arc::new(
            WebhookRegistry::open(&config.storage.webhooks_file)
                .with_context(|| format!("opening webhook registry {}", config.storage.webhooks_file))?,
        ),
        stats: Arc::new(RelayStats::default()),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bot = DiscordBotBuilder::new(config, state, shutdown_rx)
        .build()
        .await?;
    let mut discord_task = tokio::spawn(bot.run());

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - disconnecting from Discord...");
            true
        }
        result = &mut discord_task => {
            if let Err(e) = result {
                error!("Discord task panicked: {}", e);
            }
            false
        }
    };

    // Handle graceful shutdown
    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (Discord task already exited): {}", e);
        }
        match tokio::time::timeout(Duration::from_secs(5), discord_task).await {
            Ok(Ok(())) => info!("Discord disconnected gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
