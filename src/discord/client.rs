//! Discord bot client abstraction.
//!
//! Provides a high-level interface for creating and running the Discord bot,
//! hiding serenity implementation details from the rest of the application.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::types::Config;
use crate::discord::commands::CommandSurface;
use crate::discord::handler::DotRelayHandler;
use crate::discord::outlet::DiscordOutlet;
use crate::relay::{Classifier, Dispatcher, Relay, RelayStats};
use crate::store::{RouteStore, WebhookRegistry};

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    /// Bot connected and ready.
    Ready { context: Context, ready: Ready },
    /// Message received.
    Message { context: Context, message: Message },
    Disconnected,
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn new(discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> Self {
        Self { discord_events_tx }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        if let Err(error) = self.discord_events_tx.send(DiscordBotEvent::Ready { context, ready }) {
            warn!("Failed to process discord event: {}", error);
        }
    }

    async fn message(&self, context: Context, message: Message) {
        if let Err(error) = self.discord_events_tx.send(DiscordBotEvent::Message { context, message }) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

/// Stores and counters shared by every connection of the bot.
#[derive(Clone)]
pub struct RelayState {
    pub routes: Arc<RouteStore>,
    pub webhooks: Arc<WebhookRegistry>,
    pub stats: Arc<RelayStats>,
}

/// Builder for creating the Discord bot.
pub struct DiscordBotBuilder {
    config: Config,
    state: RelayState,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBotBuilder {
    pub fn new(config: Config, state: RelayState, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            config,
            state,
            shutdown_rx,
        }
    }

    /// Build the Discord bot.
    pub async fn build(self) -> anyhow::Result<DiscordBot> {
        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();

        let client = build_client(&self.config.discord.token, discord_events_tx.clone()).await?;
        let webhook_client = build_http_client()?;

        Ok(DiscordBot {
            client: Some(client),
            config: self.config,
            state: self.state,
            webhook_client,
            discord_events_rx,
            discord_events_tx,
            shutdown_rx: self.shutdown_rx,
        })
    }
}

/// Reqwest client with bounded request and connect timeouts.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()
}

async fn build_client(token: &str, discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Build the Serenity HTTP client with our custom reqwest client
    let http = HttpBuilder::new(token)
        .client(build_http_client()?)
        .build();

    let events = DiscordBotEvents::new(discord_events_tx);
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

pub struct DiscordBot {
    client: Option<Client>,
    config: Config,
    state: RelayState,
    webhook_client: reqwest::Client,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBot {
    pub async fn run(mut self) {
        // Extract shard manager before we move client into run_connection
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let client = &mut self.client;
        let discord_events_rx = &mut self.discord_events_rx;
        let mut shutdown_rx = self.shutdown_rx.clone();
        let builder = HandlerFactory {
            config: &self.config,
            state: &self.state,
            webhook_client: &self.webhook_client,
        };

        tokio::select! {
            _ = Self::run_connection(client, &self.config.discord.token, &self.discord_events_tx) => {},
            _ = Self::process_events(discord_events_rx, &builder, &mut self.shutdown_rx) => {},
            _ = async {
                // Wait for shutdown signal
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                // Gracefully shutdown Discord gateway
                if let Some(ref manager) = shard_manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(client: &mut Option<Client>, token: &str, discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>) {
        /// Create an exponential backoff iterator for Discord reconnection.
        /// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
        fn discord_backoff() -> impl Iterator<Item = Duration> {
            backon::ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(5))
                .with_max_delay(MAX_RECONNECT_DELAY)
                .with_factor(1.1)
                .with_jitter()
                .without_max_times()
                .build()
        }

        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => {
                    // serenity mostly handles reconnections itself.
                    match build_client(token, discord_events_tx.clone()).await {
                        Ok(client) => {
                            backoff = discord_backoff();
                            client
                        }
                        Err(e) => {
                            error!("Failed to rebuild Discord client: {}", e);
                            let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                            warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                            sleep(delay).await;
                            continue;
                        }
                    }
                }
            };

            match client.start().await {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                    warn!(
                        "Discord disconnected. Reconnecting in {:.1}s...",
                        delay.as_secs_f64(),
                    );
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        factory: &HandlerFactory<'_>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        let mut handler: Option<DotRelayHandler> = None;

        loop {
            tokio::select! {
                event = discord_events_rx.recv() => {
                    match event {
                        Some(DiscordBotEvent::Ready { context, ready }) => {
                            info!(
                                "Discord bot connected as {} ({} guild(s))",
                                ready.user.name,
                                ready.guilds.len()
                            );
                            handler = Some(factory.build(&context, &ready));
                        }
                        Some(DiscordBotEvent::Message { context, message }) => {
                            match handler.as_ref() {
                                Some(handler) => handler.handle_message(context, message).await,
                                None => debug!("Dropping message {} - Discord not ready", message.id),
                            }
                        }
                        Some(DiscordBotEvent::Disconnected) => {
                            handler = None;
                        }
                        None => {
                            debug!("Discord events channel closed.");
                            break;
                        }
                    }
                }

                // Shutdown signal
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event processing");
                        break;
                    }
                }
            }
        }
    }
}

/// Wires a fresh handler once the gateway reports who we are.
struct HandlerFactory<'a> {
    config: &'a Config,
    state: &'a RelayState,
    webhook_client: &'a reqwest::Client,
}

impl HandlerFactory<'_> {
    fn build(&self, context: &Context, ready: &Ready) -> DotRelayHandler {
        let classifier = Classifier::new(ready.user.id.get());
        let outlet = Arc::new(DiscordOutlet::new(
            Arc::clone(&context.http),
            Arc::clone(&context.cache),
            self.webhook_client.clone(),
        ));

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.state.routes),
            Arc::clone(&self.state.webhooks),
            Arc::clone(&outlet),
            Arc::clone(&self.state.stats),
            self.config.relay.delivery_timeout(),
        );
        let commands = CommandSurface::new(
            Arc::clone(&self.state.routes),
            Arc::clone(&self.state.webhooks),
            Arc::clone(&self.state.stats),
            classifier,
            self.config.discord.command_prefix.clone(),
        );

        DotRelayHandler::new(
            Relay::new(classifier, dispatcher),
            commands,
            outlet,
            self.config.relay.error_channel,
        )
    }
}
