//! Discord bot integration.
//!
//! Adapts serenity messages for the relay, delivers relayed events, and
//! serves the administrator commands.

pub mod adapter;
pub mod client;
pub mod commands;
pub mod handler;
pub mod outlet;

pub use client::{DiscordBotBuilder, RelayState};
