//! Dot-event classification.
//!
//! The game bridge bot posts player events either as embeds whose
//! description starts with the (bold) player name, or as plain text. Only
//! events for dot-prefixed player names are relayed.

use crate::common::messages::{
    ForwardableEvent, InboundEvent, RelayPayload, RichContent, TextPayload, UNKNOWN_DISPLAY_NAME,
};

const DOT: char = '.';
const BOLD: &str = "**";

/// Why a message was or was not picked up.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Authored by a person rather than a bot.
    HumanAuthor,
    /// Authored by this relay itself.
    OwnMessage,
    /// Automated, but nothing in it starts with a dot.
    NoDotEvent,
    Forward(ForwardableEvent),
}

impl Verdict {
    pub fn into_forwardable(self) -> Option<ForwardableEvent> {
        match self {
            Verdict::Forward(event) => Some(event),
            _ => None,
        }
    }
}

/// Classifies inbound messages for the relay.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    self_user_id: u64,
}

impl Classifier {
    pub fn new(self_user_id: u64) -> Self {
        Self { self_user_id }
    }

    /// Decide whether `event` is a forwardable dot event.
    pub fn classify(&self, event: &InboundEvent) -> Option<ForwardableEvent> {
        self.verdict(event).into_forwardable()
    }

    /// Same as [`classify`](Self::classify), keeping the reason for a rejection.
    pub fn verdict(&self, event: &InboundEvent) -> Verdict {
        if !event.author.automated {
            return Verdict::HumanAuthor;
        }
        if event.author.id == self.self_user_id {
            return Verdict::OwnMessage;
        }

        if !event.blocks.is_empty() {
            let mut qualifying = event
                .blocks
                .iter()
                .filter_map(|block| block_display_name(block).map(|name| (name, block)));

            return match qualifying.next() {
                Some((display_name, block)) => Verdict::Forward(ForwardableEvent {
                    display_name,
                    payload: RelayPayload::Rich(block.clone()),
                    alternates: qualifying
                        .map(|(_, block)| RelayPayload::Rich(block.clone()))
                        .collect(),
                }),
                None => Verdict::NoDotEvent,
            };
        }

        if event.content.starts_with(DOT) {
            let display_name = name_from_text(&event.content);
            return Verdict::Forward(ForwardableEvent::new(
                display_name.clone(),
                RelayPayload::Text(TextPayload {
                    content: event.content.clone(),
                    display_name,
                    avatar_url: event.author.avatar_url.clone(),
                    created_at: event.created_at,
                }),
            ));
        }

        Verdict::NoDotEvent
    }
}

/// Player name of a qualifying embed, or `None` if the embed is not a dot event.
///
/// `**.Name** joined` qualifies through the bold segment, `.Name joined`
/// qualifies directly. A bold description whose bold segment lacks the dot
/// does not qualify, even if a dot appears later.
pub fn block_display_name(block: &RichContent) -> Option<String> {
    let description = block.description.as_deref()?.trim();

    if description.starts_with(BOLD) {
        let candidate = description.split(BOLD).nth(1)?;
        return candidate
            .starts_with(DOT)
            .then(|| strip_dot(candidate.trim_end()));
    }

    description
        .starts_with(DOT)
        .then(|| name_from_text(description))
}

/// First whitespace-delimited token without its leading dot.
fn name_from_text(text: &str) -> String {
    text.split_whitespace()
        .next()
        .map(strip_dot)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string())
}

fn strip_dot(token: &str) -> String {
    token.strip_prefix(DOT).unwrap_or(token).to_string()
}
