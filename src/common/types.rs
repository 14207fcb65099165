//! Shared identifier and routing types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discord guild (server) snowflake.
pub type GuildId = u64;

/// Discord channel snowflake.
pub type ChannelId = u64;

/// One configured relay path inside a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "watch_channel_id")]
    pub watch: ChannelId,
    #[serde(rename = "forward_channel_id")]
    pub forward: ChannelId,
}

impl Route {
    pub fn new(watch: ChannelId, forward: ChannelId) -> Self {
        Self { watch, forward }
    }

    /// Key used to index this route's webhook endpoints.
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.watch, self.forward)
    }
}

/// Stable string key derived from a route's channel pair.
///
/// Both halves are decimal snowflakes, so the `_` separator keeps
/// distinct pairs from ever producing the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(watch: ChannelId, forward: ChannelId) -> Self {
        Self(format!("{}_{}", watch, forward))
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
