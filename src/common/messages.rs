//! Canonical message types for the relay pipeline.
//!
//! These are the only message shapes the classifier and dispatcher see.
//! Serenity types are converted into them at the Discord adapter boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::types::{ChannelId, GuildId};

/// Embed color used when a plain-text event is rendered for a channel.
pub const TEXT_EVENT_COLOR: u32 = 0x3498DB;

/// Display name used when a text event carries no usable name token.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct EventAuthor {
    pub id: u64,
    pub name: String,
    pub avatar_url: Option<String>,
    /// True for bot and webhook accounts.
    pub automated: bool,
}

/// One message received from the gateway.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author: EventAuthor,
    pub content: String,
    pub blocks: Vec<RichContent>,
    pub created_at: DateTime<Utc>,
}

/// An embed, in the JSON shape Discord webhooks accept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<RichAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<RichFooter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<RichField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<RichMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<RichMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichFooter {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichMedia {
    pub url: String,
}

/// A plain-text event lifted out of a message body.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPayload {
    pub content: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What actually gets relayed for a forwardable event.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayPayload {
    /// An embed copied verbatim from the source message.
    Rich(RichContent),
    /// Message text, rendered as an embed for channels.
    Text(TextPayload),
}

impl RelayPayload {
    /// Embed posted when this payload goes straight into a channel.
    pub fn channel_embed(&self) -> RichContent {
        match self {
            RelayPayload::Rich(block) => block.clone(),
            RelayPayload::Text(text) => RichContent {
                description: Some(text.content.clone()),
                color: Some(TEXT_EVENT_COLOR),
                author: Some(RichAuthor {
                    name: text.display_name.clone(),
                    url: None,
                    icon_url: text.avatar_url.clone(),
                }),
                timestamp: Some(text.created_at),
                ..RichContent::default()
            },
        }
    }

    /// JSON body for a webhook execution.
    ///
    /// Text payloads override the webhook's display name with the event's.
    pub fn webhook_body(&self) -> WebhookBody {
        match self {
            RelayPayload::Rich(block) => WebhookBody {
                embeds: vec![block.clone()],
                ..WebhookBody::default()
            },
            RelayPayload::Text(text) => WebhookBody {
                content: Some(text.content.clone()),
                username: Some(text.display_name.clone()),
                avatar_url: text.avatar_url.clone(),
                embeds: Vec::new(),
            },
        }
    }
}

/// Request body of Discord's execute-webhook endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebhookBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<RichContent>,
}

/// Classification result for a message worth relaying.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardableEvent {
    pub display_name: String,
    /// First qualifying block (or the text body).
    pub payload: RelayPayload,
    /// Later qualifying blocks, only tried for a route the payload could not reach.
    pub alternates: Vec<RelayPayload>,
}

impl ForwardableEvent {
    pub fn new(display_name: impl Into<String>, payload: RelayPayload) -> Self {
        Self {
            display_name: display_name.into(),
            payload,
            alternates: Vec::new(),
        }
    }

    /// All candidate payloads in delivery preference order.
    pub fn payloads(&self) -> impl Iterator<Item = &RelayPayload> {
        std::iter::once(&self.payload).chain(self.alternates.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_payload() -> TextPayload {
        TextPayload {
            content: ".Bob disconnected".to_string(),
            display_name: "Bob".to_string(),
            avatar_url: Some("https://cdn.example/avatar.png".to_string()),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_text_channel_embed() {
        let embed = RelayPayload::Text(text_payload()).channel_embed();
        assert_eq!(embed.description.as_deref(), Some(".Bob disconnected"));
        assert_eq!(embed.color, Some(TEXT_EVENT_COLOR));
        let author = embed.author.unwrap();
        assert_eq!(author.name, "Bob");
        assert_eq!(author.icon_url.as_deref(), Some("https://cdn.example/avatar.png"));
        assert!(embed.timestamp.is_some());
    }

    #[test]
    fn test_text_webhook_body_overrides_username() {
        let body = RelayPayload::Text(text_payload()).webhook_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["username"], "Bob");
        assert_eq!(json["content"], ".Bob disconnected");
        assert!(json.get("embeds").is_none());
    }

    #[test]
    fn test_rich_webhook_body_keeps_embed() {
        let block = RichContent {
            description: Some("**.Alice** joined".to_string()),
            color: Some(0x00FF00),
            ..RichContent::default()
        };
        let json = serde_json::to_value(RelayPayload::Rich(block).webhook_body()).unwrap();
        assert_eq!(json["embeds"][0]["description"], "**.Alice** joined");
        assert_eq!(json["embeds"][0]["color"], 0x00FF00);
        assert!(json.get("username").is_none());
        // Unset embed parts are left out entirely
        assert!(json["embeds"][0].get("title").is_none());
    }

    #[test]
    fn test_payloads_order() {
        let first = RelayPayload::Text(text_payload());
        let second = RelayPayload::Rich(RichContent::default());
        let mut event = ForwardableEvent::new("Bob", first.clone());
        event.alternates.push(second.clone());

        let order: Vec<_> = event.payloads().cloned().collect();
        assert_eq!(order, vec![first, second]);
    }
}
