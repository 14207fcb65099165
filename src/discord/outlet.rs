//! Discord-backed delivery for the relay.
//!
//! Channel posts go through serenity's HTTP client; webhook executions are
//! plain JSON POSTs through a dedicated reqwest client so a slow webhook host
//! never ties up the bot's rate-limited API client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::StatusCode;
use serenity::async_trait;
use serenity::builder::{CreateMessage, GetMessages};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::{ChannelType, Message};
use serenity::model::id;
use tracing::{debug, warn};

use crate::common::error::{DeliveryError, DeliveryResult};
use crate::common::messages::{InboundEvent, RelayPayload, RichContent};
use crate::common::text;
use crate::common::types::{ChannelId, GuildId};
use crate::discord::adapter::{create_embed, inbound_event};
use crate::discord::commands::RecentMessages;
use crate::relay::{ChannelDirectory, RelaySink};

/// Characters of a rejected webhook response kept for the log.
const REJECTION_BODY_CHARS: usize = 200;

/// Crossposts share a tight rate limit; give up on publishing after this.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DiscordOutlet {
    http: Arc<Http>,
    cache: Arc<Cache>,
    webhook_client: reqwest::Client,
}

impl DiscordOutlet {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, webhook_client: reqwest::Client) -> Self {
        Self {
            http,
            cache,
            webhook_client,
        }
    }

    /// Post a standalone embed, used for command replies and failure reports.
    pub async fn post_embed(&self, channel_id: ChannelId, embed: &RichContent) -> DeliveryResult {
        let channel = channel_ref(channel_id).ok_or(DeliveryError::ChannelNotFound { channel_id })?;
        channel
            .send_message(&*self.http, CreateMessage::new().embed(create_embed(embed)))
            .await?;
        Ok(())
    }

    /// Kind of a cached guild channel, if the channel is known.
    fn channel_kind(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<ChannelType> {
        let channel_id = channel_ref(channel_id)?;
        let guild = self.cache.guild(guild_ref(guild_id)?)?;
        let kind = guild.channels.get(&channel_id).map(|channel| channel.kind);
        kind
    }
}

/// Serenity ids are non-zero; a zero id never names a channel.
fn channel_ref(channel_id: ChannelId) -> Option<id::ChannelId> {
    (channel_id != 0).then(|| id::ChannelId::new(channel_id))
}

fn guild_ref(guild_id: GuildId) -> Option<id::GuildId> {
    (guild_id != 0).then(|| id::GuildId::new(guild_id))
}

impl ChannelDirectory for DiscordOutlet {
    fn channel_exists(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        self.channel_kind(guild_id, channel_id).is_some()
    }
}

#[async_trait]
impl RelaySink for DiscordOutlet {
    async fn post_to_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        payload: &RelayPayload,
    ) -> DeliveryResult {
        let channel = channel_ref(channel_id).ok_or(DeliveryError::ChannelNotFound { channel_id })?;
        let kind = self.channel_kind(guild_id, channel_id);

        let builder = CreateMessage::new().embed(create_embed(&payload.channel_embed()));
        let message = channel.send_message(&*self.http, builder).await?;

        // The post has landed; publishing runs detached so it never holds up
        // or changes the delivery result.
        if kind == Some(ChannelType::News) {
            tokio::spawn(publish(Arc::clone(&self.http), message));
        }

        Ok(())
    }

    async fn post_to_webhook(&self, url: &str, payload: &RelayPayload) -> DeliveryResult {
        let response = self
            .webhook_client
            .post(url)
            .query(&[("wait", "true")])
            .json(&payload.webhook_body())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DeliveryError::EndpointNotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: text::preview(&body, REJECTION_BODY_CHARS),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecentMessages for DiscordOutlet {
    async fn recent_messages(&self, channel_id: ChannelId, limit: u8) -> anyhow::Result<Vec<InboundEvent>> {
        let channel = channel_ref(channel_id).ok_or_else(|| anyhow!("Invalid channel id {}", channel_id))?;
        let messages = channel
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await?;
        Ok(messages.iter().map(inbound_event).collect())
    }
}

/// Crosspost a relayed message in an announcement channel.
async fn publish(http: Arc<Http>, message: Message) {
    let channel_id = message.channel_id.get();
    match tokio::time::timeout(PUBLISH_TIMEOUT, message.crosspost(&*http)).await {
        Ok(Ok(_)) => debug!("Published relayed message in announcement channel {}", channel_id),
        Ok(Err(e)) => warn!(
            "Failed to publish relayed message in announcement channel {}: {}",
            channel_id, e
        ),
        Err(_) => warn!(
            "Publishing relayed message in announcement channel {} timed out",
            channel_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ids_never_resolve() {
        assert!(channel_ref(0).is_none());
        assert!(guild_ref(0).is_none());
        assert_eq!(channel_ref(42).map(|c| c.get()), Some(42));
    }
}
