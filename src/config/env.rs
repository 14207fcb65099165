//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `DOTRELAY_DISCORD_TOKEN` - Discord bot token (falls back to `DISCORD_BOT_TOKEN`)
//! - `DOTRELAY_ROUTES_FILE` - Route store JSON path
//! - `DOTRELAY_WEBHOOKS_FILE` - Webhook registry JSON path
//! - `DOTRELAY_DELIVERY_TIMEOUT_SECS` - Per-attempt delivery timeout

use std::env;

use tracing::warn;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "DOTRELAY";

/// Token variable used by earlier deployments of the bot.
const LEGACY_TOKEN_VAR: &str = "DISCORD_BOT_TOKEN";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides_from(config, |name| env::var(name).ok())
}

/// Apply overrides using an arbitrary variable lookup.
fn apply_overrides_from(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    let var = |suffix: &str| lookup(&format!("{}_{}", ENV_PREFIX, suffix));

    if let Some(token) = var("DISCORD_TOKEN").or_else(|| lookup(LEGACY_TOKEN_VAR)) {
        config.discord.token = token;
    }

    if let Some(path) = var("ROUTES_FILE") {
        config.storage.routes_file = path;
    }
    if let Some(path) = var("WEBHOOKS_FILE") {
        config.storage.webhooks_file = path;
    }

    if let Some(timeout) = var("DELIVERY_TIMEOUT_SECS") {
        match timeout.parse() {
            Ok(secs) => config.relay.delivery_timeout_secs = secs,
            Err(_) => warn!(
                "Ignoring {}_DELIVERY_TIMEOUT_SECS='{}': not a number",
                ENV_PREFIX, timeout
            ),
        }
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `DOTRELAY_CONFIG` environment variable, otherwise returns "dotrelay.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "dotrelay.conf".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "original_token".to_string(),
                command_prefix: "!".to_string(),
            },
            storage: StorageConfig::default(),
            relay: RelayConfig::default(),
        }
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "DOTRELAY");
    }

    #[test]
    fn test_no_vars_leaves_config_unchanged() {
        let result = apply_overrides_from(make_test_config(), lookup(&[]));

        assert_eq!(result.discord.token, "original_token");
        assert_eq!(result.storage.routes_file, DEFAULT_ROUTES_FILE);
    }

    #[test]
    fn test_prefixed_token_wins_over_legacy() {
        let result = apply_overrides_from(
            make_test_config(),
            lookup(&[
                ("DOTRELAY_DISCORD_TOKEN", "new"),
                ("DISCORD_BOT_TOKEN", "legacy"),
            ]),
        );
        assert_eq!(result.discord.token, "new");
    }

    #[test]
    fn test_legacy_token_fallback() {
        let result =
            apply_overrides_from(make_test_config(), lookup(&[("DISCORD_BOT_TOKEN", "legacy")]));
        assert_eq!(result.discord.token, "legacy");
    }

    #[test]
    fn test_storage_and_timeout_overrides() {
        let result = apply_overrides_from(
            make_test_config(),
            lookup(&[
                ("DOTRELAY_ROUTES_FILE", "/tmp/r.json"),
                ("DOTRELAY_WEBHOOKS_FILE", "/tmp/w.json"),
                ("DOTRELAY_DELIVERY_TIMEOUT_SECS", "3"),
            ]),
        );
        assert_eq!(result.storage.routes_file, "/tmp/r.json");
        assert_eq!(result.storage.webhooks_file, "/tmp/w.json");
        assert_eq!(result.relay.delivery_timeout_secs, 3);
    }

    #[test]
    fn test_bad_timeout_ignored() {
        let result = apply_overrides_from(
            make_test_config(),
            lookup(&[("DOTRELAY_DELIVERY_TIMEOUT_SECS", "soon")]),
        );
        assert_eq!(result.relay.delivery_timeout_secs, DEFAULT_DELIVERY_TIMEOUT_SECS);
    }
}
