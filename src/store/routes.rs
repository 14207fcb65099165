//! Route configuration store.
//!
//! Persists guild -> list of (watch, forward) routes in a JSON file.
//! Older deployments stored a single route object per guild; those entries
//! are upgraded to the list format once, when the store is opened. Entries
//! that do not parse are dropped with a warning instead of failing the load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;
use tracing::{info, warn};

use crate::common::error::StoreResult;
use crate::common::types::{ChannelId, GuildId, Route};
use crate::store::persist::{read_json, write_json};

type RouteDocument = BTreeMap<String, Value>;
type RouteMap = BTreeMap<GuildId, Vec<Route>>;

/// Upgrade a raw document to the current layout.
///
/// Returns the routes plus whether anything had to change.
fn upgrade_document(document: RouteDocument) -> (RouteMap, bool) {
    let mut routes = RouteMap::new();
    let mut changed = false;

    for (guild_key, entry) in document {
        let guild_id = match guild_key.parse::<GuildId>() {
            Ok(id) => id,
            Err(_) => {
                warn!("Dropping route entry with non-numeric guild key '{}'", guild_key);
                changed = true;
                continue;
            }
        };

        let list = match entry {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| parse_route(guild_id, item, &mut changed))
                .collect(),
            // Single-route layout written by the first version of the bot.
            Value::Object(_) => {
                info!("Upgrading legacy single-route entry for guild {}", guild_id);
                changed = true;
                parse_route(guild_id, entry, &mut changed).into_iter().collect()
            }
            other => {
                warn!("Dropping malformed route entry for guild {}: {}", guild_id, other);
                changed = true;
                Vec::new()
            }
        };

        if !list.is_empty() {
            routes.insert(guild_id, list);
        }
    }

    (routes, changed)
}

fn parse_route(guild_id: GuildId, value: Value, changed: &mut bool) -> Option<Route> {
    match serde_json::from_value::<Route>(value) {
        Ok(route) => Some(route),
        Err(e) => {
            warn!("Dropping malformed route for guild {}: {}", guild_id, e);
            *changed = true;
            None
        }
    }
}

/// Guild-scoped route store backed by a JSON file.
#[derive(Debug)]
pub struct RouteStore {
    path: PathBuf,
    routes: RwLock<RouteMap>,
}

impl RouteStore {
    /// Open the store, creating the file if missing and upgrading legacy entries.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let (routes, needs_save) = match read_json::<RouteDocument>(&path)? {
            Some(document) => upgrade_document(document),
            None => {
                info!("No route store at {}, starting empty", path.display());
                (RouteMap::new(), true)
            }
        };

        if needs_save {
            persist(&path, &routes)?;
        }

        info!(
            "Loaded {} route(s) across {} guild(s) from {}",
            routes.values().map(Vec::len).sum::<usize>(),
            routes.len(),
            path.display()
        );

        Ok(Self {
            path,
            routes: RwLock::new(routes),
        })
    }

    /// Snapshot of a guild's routes in insertion order.
    pub fn routes_for(&self, guild_id: GuildId) -> Vec<Route> {
        self.read().get(&guild_id).cloned().unwrap_or_default()
    }

    /// Snapshot of the guild's routes watching `channel_id`.
    pub fn routes_watching(&self, guild_id: GuildId, channel_id: ChannelId) -> Vec<Route> {
        self.read()
            .get(&guild_id)
            .map(|routes| {
                routes
                    .iter()
                    .filter(|route| route.watch == channel_id)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of routes across all guilds.
    pub fn total_routes(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    /// Add a route. Returns `false` if the exact pair already exists.
    pub fn add(&self, guild_id: GuildId, route: Route) -> StoreResult<bool> {
        self.mutate(|routes| {
            let list = routes.entry(guild_id).or_default();
            if list.contains(&route) {
                return false;
            }
            list.push(route);
            true
        })
    }

    /// Remove every route of the guild watching `watch`. Returns how many went.
    pub fn remove_watching(&self, guild_id: GuildId, watch: ChannelId) -> StoreResult<usize> {
        self.mutate(|routes| {
            let Some(list) = routes.get_mut(&guild_id) else {
                return 0;
            };
            let before = list.len();
            list.retain(|route| route.watch != watch);
            let removed = before - list.len();
            if list.is_empty() {
                routes.remove(&guild_id);
            }
            removed
        })
    }

    /// Remove all of a guild's routes. Returns how many went.
    pub fn clear_guild(&self, guild_id: GuildId) -> StoreResult<usize> {
        self.mutate(|routes| routes.remove(&guild_id).map_or(0, |list| list.len()))
    }

    /// Drop every route of every guild.
    pub fn reset(&self) -> StoreResult<()> {
        self.mutate(|routes| routes.clear())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RouteMap> {
        self.routes.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a change to a copy, persist it, then publish it.
    ///
    /// The write lock is held throughout so reads observe either the old or
    /// the saved state, and a failed save leaves memory untouched.
    fn mutate<R>(&self, change: impl FnOnce(&mut RouteMap) -> R) -> StoreResult<R> {
        let mut guard = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        let result = change(&mut next);
        if next != *guard {
            persist(&self.path, &next)?;
            *guard = next;
        }
        Ok(result)
    }
}

fn persist(path: &Path, routes: &RouteMap) -> StoreResult<()> {
    let document: BTreeMap<String, &Vec<Route>> = routes
        .iter()
        .map(|(guild_id, list)| (guild_id.to_string(), list))
        .collect();
    write_json(path, &document)
}
