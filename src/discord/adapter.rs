//! Conversion between serenity models and the relay's message types.

use chrono::{DateTime, Utc};
use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use serenity::model::channel::{Embed, Message};
use serenity::model::Timestamp;

use crate::common::messages::{
    EventAuthor, InboundEvent, RichAuthor, RichContent, RichField, RichFooter, RichMedia,
};

/// Lift a gateway message into an [`InboundEvent`].
pub fn inbound_event(msg: &Message) -> InboundEvent {
    InboundEvent {
        guild_id: msg.guild_id.map(|id| id.get()),
        channel_id: msg.channel_id.get(),
        author: EventAuthor {
            id: msg.author.id.get(),
            name: msg.author.name.clone(),
            avatar_url: Some(msg.author.face()),
            // Webhook posts are automated even when Discord does not flag them as bots
            automated: msg.author.bot || msg.webhook_id.is_some(),
        },
        content: msg.content.clone(),
        blocks: msg.embeds.iter().map(rich_content).collect(),
        created_at: to_datetime(&msg.timestamp),
    }
}

/// Copy every relayable part of an embed.
pub fn rich_content(embed: &Embed) -> RichContent {
    RichContent {
        title: embed.title.clone(),
        description: embed.description.clone(),
        url: embed.url.clone(),
        color: embed.colour.map(|colour| colour.0),
        author: embed.author.as_ref().map(|author| RichAuthor {
            name: author.name.clone(),
            url: author.url.clone(),
            icon_url: author.icon_url.clone(),
        }),
        footer: embed.footer.as_ref().map(|footer| RichFooter {
            text: footer.text.clone(),
            icon_url: footer.icon_url.clone(),
        }),
        fields: embed
            .fields
            .iter()
            .map(|field| RichField {
                name: field.name.clone(),
                value: field.value.clone(),
                inline: field.inline,
            })
            .collect(),
        image: embed.image.as_ref().map(|image| RichMedia {
            url: image.url.clone(),
        }),
        thumbnail: embed.thumbnail.as_ref().map(|thumbnail| RichMedia {
            url: thumbnail.url.clone(),
        }),
        timestamp: embed.timestamp.as_ref().map(to_datetime),
    }
}

/// Build the serenity embed posted into a channel.
pub fn create_embed(block: &RichContent) -> CreateEmbed {
    let mut embed = CreateEmbed::new();

    if let Some(title) = &block.title {
        embed = embed.title(title);
    }
    if let Some(description) = &block.description {
        embed = embed.description(description);
    }
    if let Some(url) = &block.url {
        embed = embed.url(url);
    }
    if let Some(color) = block.color {
        embed = embed.colour(color);
    }
    if let Some(author) = &block.author {
        let mut builder = CreateEmbedAuthor::new(&author.name);
        if let Some(url) = &author.url {
            builder = builder.url(url);
        }
        if let Some(icon_url) = &author.icon_url {
            builder = builder.icon_url(icon_url);
        }
        embed = embed.author(builder);
    }
    if let Some(footer) = &block.footer {
        let mut builder = CreateEmbedFooter::new(&footer.text);
        if let Some(icon_url) = &footer.icon_url {
            builder = builder.icon_url(icon_url);
        }
        embed = embed.footer(builder);
    }
    for field in &block.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(image) = &block.image {
        embed = embed.image(&image.url);
    }
    if let Some(thumbnail) = &block.thumbnail {
        embed = embed.thumbnail(&thumbnail.url);
    }
    if let Some(timestamp) = block.timestamp.and_then(to_timestamp) {
        embed = embed.timestamp(timestamp);
    }

    embed
}

fn to_datetime(timestamp: &Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

fn to_timestamp(datetime: DateTime<Utc>) -> Option<Timestamp> {
    Timestamp::from_unix_timestamp(datetime.timestamp()).ok()
}
