//! Discord message handling.
//!
//! Every guild message either runs an administrator command or goes through
//! the relay pipeline. Both run in spawned tasks so a slow webhook host or a
//! panic never stalls the gateway event loop.

use std::sync::Arc;

use serenity::model::channel::Message;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::common::error::CommandError;
use crate::common::messages::InboundEvent;
use crate::common::text;
use crate::common::types::ChannelId;
use crate::discord::adapter::inbound_event;
use crate::discord::commands::{CommandSurface, DotCommand, Reply};
use crate::discord::outlet::DiscordOutlet;
use crate::relay::Relay;

const FAILURE_DETAIL_CHARS: usize = 1000;

/// Routes gateway messages to the command surface or the relay.
pub struct DotRelayHandler {
    relay: Arc<Relay<DiscordOutlet>>,
    commands: Arc<CommandSurface>,
    outlet: Arc<DiscordOutlet>,
    /// Channel receiving reports of crashed relay tasks.
    error_channel: Option<ChannelId>,
}

impl DotRelayHandler {
    pub fn new(
        relay: Relay<DiscordOutlet>,
        commands: CommandSurface,
        outlet: Arc<DiscordOutlet>,
        error_channel: Option<ChannelId>,
    ) -> Self {
        Self {
            relay: Arc::new(relay),
            commands: Arc::new(commands),
            outlet,
            error_channel,
        }
    }

    pub async fn handle_message(&self, ctx: Context, msg: Message) {
        // Commands come from people; bots only ever feed the relay
        if !msg.author.bot {
            if let Some(parsed) = self.commands.parse(&msg.content) {
                self.spawn_command(ctx, msg, parsed);
                return;
            }
        }

        let event = inbound_event(&msg);
        if !relay_candidate(&event) {
            return;
        }
        let relay = Arc::clone(&self.relay);
        let outlet = Arc::clone(&self.outlet);
        let error_channel = self.error_channel;

        tokio::spawn(async move {
            let task = tokio::spawn(async move { relay.process(&event).await });
            match task.await {
                Ok(Some(report)) => debug!(
                    "Message {} relayed along {} of {} route(s)",
                    msg.id,
                    report.delivered_routes(),
                    report.outcomes.len()
                ),
                Ok(None) => {}
                Err(e) => {
                    error!("Relay task for message {} failed: {}", msg.id, e);
                    report_failure(
                        &outlet,
                        error_channel,
                        format!("Relaying message {} in channel {} failed: {}", msg.id, msg.channel_id, e),
                    )
                    .await;
                }
            }
        });
    }

    fn spawn_command(&self, ctx: Context, msg: Message, parsed: Result<DotCommand, CommandError>) {
        let Some(guild_id) = msg.guild_id else {
            debug!("Ignoring command outside a guild from {}", msg.author.name);
            return;
        };
        let commands = Arc::clone(&self.commands);
        let outlet = Arc::clone(&self.outlet);

        tokio::spawn(async move {
            let is_admin = msg
                .author_permissions(&ctx.cache)
                .is_some_and(|permissions| permissions.administrator());

            let reply = match parsed {
                Err(e) => commands.rejection(&e),
                Ok(command) if !is_admin => {
                    info!(
                        "Denied {:?} from non-administrator {} in guild {}",
                        command, msg.author.name, guild_id
                    );
                    Reply::permission_denied()
                }
                Ok(command) => {
                    info!("{:?} from {} in guild {}", command, msg.author.name, guild_id);
                    if command.carries_secret() {
                        // The message holds a webhook token
                        if let Err(e) = msg.delete(&ctx).await {
                            warn!("Failed to delete command message {}: {}", msg.id, e);
                        }
                    }
                    commands.execute(guild_id.get(), &command, &*outlet).await
                }
            };

            if let Err(e) = outlet.post_embed(msg.channel_id.get(), &reply.into_rich()).await {
                error!("Failed to send command reply to {}: {}", msg.channel_id, e);
            }
        });
    }
}

/// Only automated guild messages can carry dot events.
fn relay_candidate(event: &InboundEvent) -> bool {
    event.author.automated && event.guild_id.is_some()
}

/// Best-effort report of a crashed relay task. Failing to report is only logged.
async fn report_failure(outlet: &DiscordOutlet, error_channel: Option<ChannelId>, detail: String) {
    let Some(channel_id) = error_channel else {
        return;
    };

    let reply = Reply::error(
        "❌ Relay Failure",
        format!("```\n{}\n```", text::tail(&detail, FAILURE_DETAIL_CHARS)),
    );
    if let Err(e) = outlet.post_embed(channel_id, &reply.into_rich()).await {
        warn!("Failed to report relay failure to channel {}: {}", channel_id, e);
    }
}
