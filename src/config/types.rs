//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_COMMAND_PREFIX: &str = "!";
pub const DEFAULT_ROUTES_FILE: &str = "chat_config.json";
pub const DEFAULT_WEBHOOKS_FILE: &str = "webhooks.json";
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// May be left empty in the file and supplied through the environment.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            command_prefix: default_command_prefix(),
        }
    }
}

/// Locations of the JSON state files.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_routes_file")]
    pub routes_file: String,
    #[serde(default = "default_webhooks_file")]
    pub webhooks_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            routes_file: default_routes_file(),
            webhooks_file: default_webhooks_file(),
        }
    }
}

/// Relay delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Channel that receives truncated reports of unexpected relay failures.
    #[serde(default)]
    pub error_channel: Option<u64>,
}

impl RelayConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_secs: default_delivery_timeout_secs(),
            error_channel: None,
        }
    }
}

fn default_command_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_string()
}

fn default_routes_file() -> String {
    DEFAULT_ROUTES_FILE.to_string()
}

fn default_webhooks_file() -> String {
    DEFAULT_WEBHOOKS_FILE.to_string()
}

fn default_delivery_timeout_secs() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_SECS
}
