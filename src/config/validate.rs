//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Longest per-attempt delivery timeout accepted.
const MAX_DELIVERY_TIMEOUT_SECS: u64 = 120;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Validate Discord config
    if config.discord.token.is_empty() {
        errors.push("discord.token is required (or set DOTRELAY_DISCORD_TOKEN)".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    if config.discord.command_prefix.trim().is_empty() {
        errors.push("discord.command_prefix must not be empty".to_string());
    }

    // Validate storage config
    if config.storage.routes_file.is_empty() {
        errors.push("storage.routes_file must not be empty".to_string());
    }
    if config.storage.webhooks_file.is_empty() {
        errors.push("storage.webhooks_file must not be empty".to_string());
    }
    if config.storage.routes_file == config.storage.webhooks_file {
        errors.push(format!(
            "storage.routes_file and storage.webhooks_file must differ (both '{}')",
            config.storage.routes_file
        ));
    }

    // Validate relay config
    let timeout = config.relay.delivery_timeout_secs;
    if timeout == 0 || timeout > MAX_DELIVERY_TIMEOUT_SECS {
        errors.push(format!(
            "relay.delivery_timeout_secs must be 1-{} (got {})",
            MAX_DELIVERY_TIMEOUT_SECS, timeout
        ));
    }
    if config.relay.error_channel == Some(0) {
        errors.push("relay.error_channel must be non-zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
