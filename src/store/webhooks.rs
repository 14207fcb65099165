//! Webhook endpoint registry.
//!
//! Persists guild -> route key -> ordered webhook URLs. URLs are checked
//! against Discord's webhook hosts when added; nothing is re-validated at
//! delivery time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use fancy_regex::Regex;
use tracing::{info, warn};

use crate::common::error::{StoreError, StoreResult};
use crate::common::types::{GuildId, RouteKey};
use crate::store::persist::{read_json, write_json};

/// URL prefixes of Discord-hosted webhook endpoints, including the
/// canary/ptb release channels and the legacy discordapp.com host.
pub const ACCEPTED_WEBHOOK_PREFIXES: &[&str] = &[
    "https://discord.com/api/webhooks/",
    "https://discordapp.com/api/webhooks/",
    "https://canary.discord.com/api/webhooks/",
    "https://ptb.discord.com/api/webhooks/",
    "https://canary.discordapp.com/api/webhooks/",
    "https://ptb.discordapp.com/api/webhooks/",
];

/// `<webhook id>/<token>` tail following an accepted prefix.
static WEBHOOK_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>\d{15,25})/(?P<token>[A-Za-z0-9_\-]+)/?$")
        .unwrap_or_else(|e| panic!("webhook tail pattern is invalid: {}", e))
});

/// Split an accepted webhook URL into (prefix, id, token).
fn parse_webhook_url(url: &str) -> Option<(&'static str, String, String)> {
    let prefix: &'static str = ACCEPTED_WEBHOOK_PREFIXES
        .iter()
        .copied()
        .find(|prefix| url.starts_with(prefix))?;
    let tail = &url[prefix.len()..];
    let captures = WEBHOOK_TAIL.captures(tail).ok().flatten()?;
    let id = captures.name("id")?.as_str().to_string();
    let token = captures.name("token")?.as_str().to_string();
    Some((prefix, id, token))
}

/// Check that a URL points at a Discord webhook endpoint.
pub fn validate_webhook_url(url: &str) -> StoreResult<()> {
    match parse_webhook_url(url) {
        Some(_) => Ok(()),
        None => Err(StoreError::InvalidWebhookUrl {
            url: url.to_string(),
        }),
    }
}

/// Render a webhook URL with its token hidden, for listings.
pub fn mask_webhook_url(url: &str) -> String {
    match parse_webhook_url(url) {
        Some((prefix, id, token)) => {
            let shown: String = token.chars().take(4).collect();
            format!("{}{}/{}****", prefix, id, shown)
        }
        None => "<unrecognized webhook url>".to_string(),
    }
}

type WebhookDocument = BTreeMap<String, BTreeMap<RouteKey, Vec<String>>>;
type WebhookMap = BTreeMap<GuildId, BTreeMap<RouteKey, Vec<String>>>;

/// Guild-scoped webhook registry backed by a JSON file.
#[derive(Debug)]
pub struct WebhookRegistry {
    path: PathBuf,
    hooks: RwLock<WebhookMap>,
}

impl WebhookRegistry {
    /// Open the registry, creating the file if missing.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let hooks = match read_json::<WebhookDocument>(&path)? {
            Some(document) => from_document(document),
            None => {
                info!("No webhook registry at {}, starting empty", path.display());
                let empty = WebhookMap::new();
                persist(&path, &empty)?;
                empty
            }
        };

        info!(
            "Loaded {} webhook endpoint(s) from {}",
            hooks
                .values()
                .flat_map(|routes| routes.values())
                .map(Vec::len)
                .sum::<usize>(),
            path.display()
        );

        Ok(Self {
            path,
            hooks: RwLock::new(hooks),
        })
    }

    /// Snapshot of the endpoints registered for one route, in delivery order.
    pub fn endpoints(&self, guild_id: GuildId, key: &RouteKey) -> Vec<String> {
        self.read()
            .get(&guild_id)
            .and_then(|routes| routes.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every route key's endpoints in a guild.
    pub fn guild_endpoints(&self, guild_id: GuildId) -> BTreeMap<RouteKey, Vec<String>> {
        self.read().get(&guild_id).cloned().unwrap_or_default()
    }

    /// Register an endpoint. Returns `false` if the URL is already listed for the route.
    pub fn add(&self, guild_id: GuildId, key: &RouteKey, url: &str) -> StoreResult<bool> {
        let url = url.trim();
        validate_webhook_url(url)?;

        self.mutate(|hooks| {
            let list = hooks
                .entry(guild_id)
                .or_default()
                .entry(key.clone())
                .or_default();
            if list.iter().any(|existing| existing == url) {
                return false;
            }
            list.push(url.to_string());
            true
        })
    }

    /// Remove an endpoint. Returns `false` if it was not registered.
    pub fn remove(&self, guild_id: GuildId, key: &RouteKey, url: &str) -> StoreResult<bool> {
        let url = url.trim();
        self.mutate(|hooks| {
            let Some(routes) = hooks.get_mut(&guild_id) else {
                return false;
            };
            let Some(list) = routes.get_mut(key) else {
                return false;
            };
            let before = list.len();
            list.retain(|existing| existing != url);
            let removed = list.len() < before;
            if list.is_empty() {
                routes.remove(key);
            }
            if routes.is_empty() {
                hooks.remove(&guild_id);
            }
            removed
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, WebhookMap> {
        self.hooks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn mutate<R>(&self, change: impl FnOnce(&mut WebhookMap) -> R) -> StoreResult<R> {
        let mut guard = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        let result = change(&mut next);
        if next != *guard {
            persist(&self.path, &next)?;
            *guard = next;
        }
        Ok(result)
    }
}

fn from_document(document: WebhookDocument) -> WebhookMap {
    document
        .into_iter()
        .filter_map(|(guild_key, routes)| match guild_key.parse::<GuildId>() {
            Ok(guild_id) => Some((guild_id, routes)),
            Err(_) => {
                warn!("Ignoring webhook entry with non-numeric guild key '{}'", guild_key);
                None
            }
        })
        .collect()
}

fn persist(path: &Path, hooks: &WebhookMap) -> StoreResult<()> {
    let document: BTreeMap<String, &BTreeMap<RouteKey, Vec<String>>> = hooks
        .iter()
        .map(|(guild_id, routes)| (guild_id.to_string(), routes))
        .collect();
    write_json(path, &document)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tokio_test::assert_err;

    use super::*;

    const HOOK_A: &str = "https://discord.com/api/webhooks/123456789012345678/tokenAAAA_aaaa-1";
    const HOOK_B: &str = "https://ptb.discord.com/api/webhooks/223456789012345678/tokenBBBB";

    fn registry_in(dir: &tempfile::TempDir) -> WebhookRegistry {
        WebhookRegistry::open(dir.path().join("webhooks.json")).unwrap()
    }

    #[test]
    fn test_accepts_known_hosts() {
        assert!(validate_webhook_url(HOOK_A).is_ok());
        assert!(validate_webhook_url(HOOK_B).is_ok());
        assert!(validate_webhook_url(
            "https://discordapp.com/api/webhooks/123456789012345678/abc"
        )
        .is_ok());
        assert!(validate_webhook_url(
            "https://canary.discord.com/api/webhooks/123456789012345678/abc/"
        )
        .is_ok());
    }

    #[test]
    fn test_rejects_foreign_or_malformed_urls() {
        assert_err!(validate_webhook_url("https://example.com/api/webhooks/1/abc"));
        assert_err!(validate_webhook_url("http://discord.com/api/webhooks/123456789012345678/abc"));
        assert_err!(validate_webhook_url("https://discord.com.evil.net/api/webhooks/123456789012345678/a"));
        assert_err!(validate_webhook_url("https://discord.com/api/webhooks/"));
        assert_err!(validate_webhook_url("https://discord.com/api/webhooks/notanid/abc"));
    }

    #[test]
    fn test_mask_hides_token() {
        let masked = mask_webhook_url(HOOK_A);
        assert_eq!(masked, "https://discord.com/api/webhooks/123456789012345678/toke****");
        assert!(!masked.contains("aaaa"));
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        let key = RouteKey::new(1, 2);

        assert!(registry.add(9, &key, HOOK_B).unwrap());
        assert!(registry.add(9, &key, HOOK_A).unwrap());
        assert_eq!(registry.endpoints(9, &key), vec![HOOK_B, HOOK_A]);
    }

    #[test]
    fn test_duplicate_url_rejected_per_route() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        let key = RouteKey::new(1, 2);
        let other = RouteKey::new(1, 3);

        assert!(registry.add(9, &key, HOOK_A).unwrap());
        assert!(!registry.add(9, &key, HOOK_A).unwrap());
        // Same URL under a different route is a separate entry
        assert!(registry.add(9, &other, HOOK_A).unwrap());
        assert_eq!(registry.endpoints(9, &key).len(), 1);
    }

    #[test]
    fn test_invalid_url_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        let key = RouteKey::new(1, 2);

        let result = registry.add(9, &key, "https://example.com/hook");
        assert!(matches!(result, Err(StoreError::InvalidWebhookUrl { .. })));
        assert!(registry.endpoints(9, &key).is_empty());
    }

    #[test]
    fn test_remove_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir);
        let key = RouteKey::new(1, 2);
        registry.add(9, &key, HOOK_A).unwrap();
        registry.add(9, &key, HOOK_B).unwrap();

        assert!(registry.remove(9, &key, HOOK_A).unwrap());
        assert!(!registry.remove(9, &key, HOOK_A).unwrap());
        assert_eq!(registry.endpoints(9, &key), vec![HOOK_B]);

        registry.remove(9, &key, HOOK_B).unwrap();
        assert!(registry.guild_endpoints(9).is_empty());
    }

    #[test]
    fn test_persisted_layout_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = RouteKey::new(10, 20);
        {
            let registry = registry_in(&dir);
            registry.add(5, &key, HOOK_A).unwrap();
        }

        let raw: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("webhooks.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["5"]["10_20"][0], HOOK_A);

        let reopened = registry_in(&dir);
        assert_eq!(reopened.endpoints(5, &key), vec![HOOK_A]);
    }
}
