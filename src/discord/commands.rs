//! Administrator commands (!setupdotnotify, !listdotwebhooks, etc).
//!
//! Parsing is pure; execution runs against the route and webhook stores and
//! produces a [`Reply`] that the handler renders as an embed.

use std::sync::Arc;

use serenity::async_trait;
use tracing::{debug, info, warn};

use crate::common::error::{CommandError, StoreError};
use crate::common::messages::{InboundEvent, RichContent, RichField};
use crate::common::text;
use crate::common::types::{ChannelId, GuildId, Route};
use crate::relay::{ChannelDirectory, Classifier, RelayStats, Verdict};
use crate::store::{mask_webhook_url, RouteStore, WebhookRegistry};

pub const SUCCESS_COLOR: u32 = 0x2ECC71;
pub const INFO_COLOR: u32 = 0x3498DB;
pub const ERROR_COLOR: u32 = 0xE74C3C;

/// Messages fetched for the debug report.
pub const DEBUG_HISTORY_LIMIT: u8 = 10;
const DEBUG_PREVIEW_CHARS: usize = 50;
const ERROR_DETAIL_CHARS: usize = 1000;

struct CommandSpec {
    name: &'static str,
    args: &'static str,
    about: &'static str,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "setupdotnotify",
        args: "<watch channel> <forward channel>",
        about: "Relay dot events from the watch channel to the forward channel",
    },
    CommandSpec {
        name: "cleardotnotify",
        args: "[watch channel]",
        about: "Remove every route watching a channel, or all routes in this server",
    },
    CommandSpec {
        name: "listdotnotify",
        args: "",
        about: "List this server's routes",
    },
    CommandSpec {
        name: "resetdotconfig",
        args: "",
        about: "Delete every route of every server",
    },
    CommandSpec {
        name: "adddotwebhook",
        args: "<watch channel> <forward channel> <webhook url>",
        about: "Deliver a route's events through a webhook",
    },
    CommandSpec {
        name: "removedotwebhook",
        args: "<watch channel> <forward channel> <webhook url>",
        about: "Stop delivering a route's events through a webhook",
    },
    CommandSpec {
        name: "listdotwebhooks",
        args: "",
        about: "List this server's webhooks",
    },
    CommandSpec {
        name: "dotstatus",
        args: "",
        about: "Check routes and show relay counters",
    },
    CommandSpec {
        name: "debugdot",
        args: "",
        about: "Show how recent bot messages in the first watch channel are classified",
    },
    CommandSpec {
        name: "dothelp",
        args: "",
        about: "Show this help message",
    },
];

/// A parsed administrator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotCommand {
    SetupRoute { route: Route },
    ClearRoutes { watch: Option<ChannelId> },
    ListRoutes,
    ResetAll,
    AddWebhook { route: Route, url: String },
    RemoveWebhook { route: Route, url: String },
    ListWebhooks,
    Status,
    Debug,
    Help,
}

impl DotCommand {
    /// Whether the invoking message carries a webhook token and should not stay visible.
    pub fn carries_secret(&self) -> bool {
        matches!(
            self,
            DotCommand::AddWebhook { .. } | DotCommand::RemoveWebhook { .. }
        )
    }

    fn failure_title(&self) -> &'static str {
        match self {
            DotCommand::SetupRoute { .. } => "❌ Error in Setup",
            DotCommand::ClearRoutes { .. } => "❌ Error Clearing Setup",
            DotCommand::ListRoutes => "❌ Error Listing Setups",
            DotCommand::ResetAll => "❌ Error Resetting Config",
            DotCommand::AddWebhook { .. } => "❌ Error Adding Webhook",
            DotCommand::RemoveWebhook { .. } => "❌ Error Removing Webhook",
            DotCommand::ListWebhooks => "❌ Error Listing Webhooks",
            DotCommand::Status => "❌ Error in Status Check",
            DotCommand::Debug => "❌ Error in Debug",
            DotCommand::Help => "❌ Error in Help",
        }
    }
}

/// Parse a message as a command.
///
/// Returns `None` for anything that is not one of our commands, and an error
/// for a known command with bad arguments.
pub fn parse_command(prefix: &str, content: &str) -> Option<Result<DotCommand, CommandError>> {
    let body = content.trim().strip_prefix(prefix)?;
    let mut parts = body.split_whitespace();
    let name = parts.next()?.to_lowercase();
    let spec = COMMANDS.iter().find(|spec| spec.name == name)?;
    let args: Vec<&str> = parts.collect();
    Some(build_command(spec, &args))
}

fn build_command(spec: &CommandSpec, args: &[&str]) -> Result<DotCommand, CommandError> {
    let route = |watch: &str, forward: &str| -> Result<Route, CommandError> {
        Ok(Route::new(parse_channel_arg(watch)?, parse_channel_arg(forward)?))
    };

    match (spec.name, args) {
        ("setupdotnotify", [watch, forward]) => Ok(DotCommand::SetupRoute {
            route: route(*watch, *forward)?,
        }),
        ("cleardotnotify", []) => Ok(DotCommand::ClearRoutes { watch: None }),
        ("cleardotnotify", [watch]) => Ok(DotCommand::ClearRoutes {
            watch: Some(parse_channel_arg(watch)?),
        }),
        ("listdotnotify", []) => Ok(DotCommand::ListRoutes),
        ("resetdotconfig", []) => Ok(DotCommand::ResetAll),
        ("adddotwebhook", [watch, forward, url]) => Ok(DotCommand::AddWebhook {
            route: route(*watch, *forward)?,
            url: url.to_string(),
        }),
        ("removedotwebhook", [watch, forward, url]) => Ok(DotCommand::RemoveWebhook {
            route: route(*watch, *forward)?,
            url: url.to_string(),
        }),
        ("listdotwebhooks", []) => Ok(DotCommand::ListWebhooks),
        ("dotstatus", []) => Ok(DotCommand::Status),
        ("debugdot", []) => Ok(DotCommand::Debug),
        ("dothelp", _) => Ok(DotCommand::Help),
        _ => Err(CommandError::Usage {
            usage: format!("{} {}", spec.name, spec.args).trim_end().to_string(),
        }),
    }
}

/// Accept a channel mention (`<#123>`) or a raw channel id.
pub fn parse_channel_arg(arg: &str) -> Result<ChannelId, CommandError> {
    let raw = arg
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(arg);
    raw.parse::<ChannelId>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| CommandError::InvalidChannel(arg.to_string()))
}

/// Recent channel history, for the debug report.
#[async_trait]
pub trait RecentMessages: Send + Sync {
    /// Up to `limit` of the channel's latest messages, newest first.
    async fn recent_messages(&self, channel_id: ChannelId, limit: u8) -> anyhow::Result<Vec<InboundEvent>>;
}

/// Embed reply to an administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub title: String,
    pub description: String,
    pub fields: Vec<RichField>,
    pub color: u32,
}

impl Reply {
    fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
            color,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, SUCCESS_COLOR)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, INFO_COLOR)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, ERROR_COLOR)
    }

    pub fn permission_denied() -> Self {
        Self::error(
            "❌ Permission Denied",
            "Only server administrators can configure dot notifications.",
        )
    }

    /// Failure reply carrying the error chain, keeping the last 1000 characters.
    pub fn failure(title: &str, error: &anyhow::Error) -> Self {
        let details = format!("{:#}", error);
        let summary = text::preview(&error.to_string(), ERROR_DETAIL_CHARS);
        Self::error(title, format!("**Error Message:** {}", summary)).field(
            "Full Error Details",
            format!("```\n{}\n```", text::tail(&details, ERROR_DETAIL_CHARS)),
        )
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(RichField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    pub fn into_rich(self) -> RichContent {
        RichContent {
            title: Some(self.title),
            description: Some(self.description),
            color: Some(self.color),
            fields: self.fields,
            ..RichContent::default()
        }
    }
}

/// Executes administrator commands against the stores.
pub struct CommandSurface {
    routes: Arc<RouteStore>,
    webhooks: Arc<WebhookRegistry>,
    stats: Arc<RelayStats>,
    classifier: Classifier,
    prefix: String,
}

impl CommandSurface {
    pub fn new(
        routes: Arc<RouteStore>,
        webhooks: Arc<WebhookRegistry>,
        stats: Arc<RelayStats>,
        classifier: Classifier,
        prefix: String,
    ) -> Self {
        Self {
            routes,
            webhooks,
            stats,
            classifier,
            prefix,
        }
    }

    pub fn parse(&self, content: &str) -> Option<Result<DotCommand, CommandError>> {
        parse_command(&self.prefix, content)
    }

    /// Reply for a known command with unusable arguments.
    pub fn rejection(&self, error: &CommandError) -> Reply {
        let description = match error {
            CommandError::Usage { usage } => format!("Usage: `{}{}`", self.prefix, usage),
            CommandError::InvalidChannel(_) => error.to_string(),
        };
        Reply::error("❌ Invalid Command", description)
    }

    /// Run a command. Failures are rendered into the reply, never returned.
    pub async fn execute<P>(&self, guild_id: GuildId, command: &DotCommand, platform: &P) -> Reply
    where
        P: ChannelDirectory + RecentMessages,
    {
        debug!("Executing {:?} in guild {}", command, guild_id);
        match self.run(guild_id, command, platform).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Command {:?} failed in guild {}: {:#}", command, guild_id, e);
                Reply::failure(command.failure_title(), &e)
            }
        }
    }

    async fn run<P>(&self, guild_id: GuildId, command: &DotCommand, platform: &P) -> anyhow::Result<Reply>
    where
        P: ChannelDirectory + RecentMessages,
    {
        match command {
            DotCommand::SetupRoute { route } => self.setup_route(guild_id, *route, platform),
            DotCommand::ClearRoutes { watch } => self.clear_routes(guild_id, *watch),
            DotCommand::ListRoutes => Ok(self.list_routes(guild_id, platform)),
            DotCommand::ResetAll => {
                self.routes.reset()?;
                info!("All routes reset from guild {}", guild_id);
                Ok(Reply::success(
                    "✅ Config Reset",
                    "The entire dot notification config has been cleared. You can now set up fresh.",
                ))
            }
            DotCommand::AddWebhook { route, url } => self.add_webhook(guild_id, *route, url),
            DotCommand::RemoveWebhook { route, url } => self.remove_webhook(guild_id, *route, url),
            DotCommand::ListWebhooks => Ok(self.list_webhooks(guild_id)),
            DotCommand::Status => Ok(self.status(guild_id, platform)),
            DotCommand::Debug => self.debug(guild_id, platform).await,
            DotCommand::Help => Ok(self.help()),
        }
    }

    fn setup_route(
        &self,
        guild_id: GuildId,
        route: Route,
        channels: &dyn ChannelDirectory,
    ) -> anyhow::Result<Reply> {
        let missing: Vec<String> = [route.watch, route.forward]
            .into_iter()
            .filter(|channel| !channels.channel_exists(guild_id, *channel))
            .map(mention)
            .collect();
        if !missing.is_empty() {
            return Ok(Reply::error(
                "❌ Channel Not Found",
                format!("These channels do not exist in this server: {}", missing.join(", ")),
            ));
        }

        let reply = if self.routes.add(guild_id, route)? {
            info!("Route {} added in guild {}", route.key(), guild_id);
            Reply::success(
                "✅ Dot Notification Configured",
                "The dot notification forwarding system has been set up!",
            )
        } else {
            Reply::info("ℹ️ Already Configured", "This exact setup already exists.")
        };

        Ok(reply
            .field("👀 Watch Channel", mention(route.watch))
            .field("📨 Forward Channel", mention(route.forward))
            .field(
                "How it works",
                "Bot messages whose player name starts with `.` in the watch channel will be forwarded to the forward channel.",
            ))
    }

    fn clear_routes(&self, guild_id: GuildId, watch: Option<ChannelId>) -> anyhow::Result<Reply> {
        if self.routes.routes_for(guild_id).is_empty() {
            return Ok(Reply::info(
                "ℹ️ No Setup Found",
                "There is no dot notification setup for this server.",
            ));
        }

        let reply = match watch {
            Some(watch) => {
                let removed = self.routes.remove_watching(guild_id, watch)?;
                if removed > 0 {
                    info!("Removed {} route(s) watching {} in guild {}", removed, watch, guild_id);
                    Reply::success(
                        "✅ Dot Notification Cleared",
                        format!("Removed setup for {}", mention(watch)),
                    )
                } else {
                    Reply::info(
                        "ℹ️ No Setup Found",
                        format!("No setup found for {}", mention(watch)),
                    )
                }
            }
            None => {
                let removed = self.routes.clear_guild(guild_id)?;
                info!("Cleared {} route(s) in guild {}", removed, guild_id);
                Reply::success(
                    "✅ All Dot Notifications Cleared",
                    "All dot notification setups have been removed.",
                )
            }
        };
        Ok(reply)
    }

    fn list_routes(&self, guild_id: GuildId, channels: &dyn ChannelDirectory) -> Reply {
        let routes = self.routes.routes_for(guild_id);
        if routes.is_empty() {
            return Reply::info(
                "ℹ️ No Setups Found",
                "There are no dot notification setups for this server.",
            );
        }

        let label = |channel_id: ChannelId| {
            if channels.channel_exists(guild_id, channel_id) {
                mention(channel_id)
            } else {
                format!("Unknown ({})", channel_id)
            }
        };

        routes.iter().enumerate().fold(
            Reply::info(
                "📋 Dot Notification Setups",
                format!("Found {} setup(s):", routes.len()),
            ),
            |reply, (i, route)| {
                reply.field(
                    format!("Setup #{}", i + 1),
                    format!("👀 Watch: {}\n📨 Forward: {}", label(route.watch), label(route.forward)),
                )
            },
        )
    }

    fn add_webhook(&self, guild_id: GuildId, route: Route, url: &str) -> anyhow::Result<Reply> {
        if !self.routes.routes_for(guild_id).contains(&route) {
            return Ok(Reply::info(
                "ℹ️ No Such Route",
                format!(
                    "Set up {} → {} with `{}setupdotnotify` before adding webhooks to it.",
                    mention(route.watch),
                    mention(route.forward),
                    self.prefix
                ),
            ));
        }

        match self.webhooks.add(guild_id, &route.key(), url) {
            Ok(true) => {
                info!(
                    "Webhook {} added to route {} in guild {}",
                    mask_webhook_url(url),
                    route.key(),
                    guild_id
                );
                Ok(Reply::success(
                    "✅ Webhook Added",
                    format!(
                        "Events from {} will be delivered through `{}`.",
                        mention(route.watch),
                        mask_webhook_url(url)
                    ),
                ))
            }
            Ok(false) => Ok(Reply::info(
                "ℹ️ Already Configured",
                "This webhook is already registered for that route.",
            )),
            Err(StoreError::InvalidWebhookUrl { .. }) => Ok(Reply::error(
                "❌ Invalid Webhook URL",
                "The URL must be a Discord webhook, e.g. `https://discord.com/api/webhooks/<id>/<token>`.",
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_webhook(&self, guild_id: GuildId, route: Route, url: &str) -> anyhow::Result<Reply> {
        let reply = if self.webhooks.remove(guild_id, &route.key(), url)? {
            info!(
                "Webhook {} removed from route {} in guild {}",
                mask_webhook_url(url),
                route.key(),
                guild_id
            );
            Reply::success(
                "✅ Webhook Removed",
                format!("`{}` will no longer receive events.", mask_webhook_url(url)),
            )
        } else {
            Reply::info(
                "ℹ️ No Webhook Found",
                "That webhook is not registered for that route.",
            )
        };
        Ok(reply)
    }

    fn list_webhooks(&self, guild_id: GuildId) -> Reply {
        let endpoints = self.webhooks.guild_endpoints(guild_id);
        if endpoints.is_empty() {
            return Reply::info(
                "ℹ️ No Webhooks Found",
                "There are no webhooks registered for this server.",
            );
        }

        let total: usize = endpoints.values().map(Vec::len).sum();
        endpoints.iter().fold(
            Reply::info("🔗 Dot Notification Webhooks", format!("Found {} webhook(s):", total)),
            |reply, (key, urls)| {
                let listed = urls
                    .iter()
                    .enumerate()
                    .map(|(i, url)| format!("{}. `{}`", i + 1, mask_webhook_url(url)))
                    .collect::<Vec<_>>()
                    .join("\n");
                reply.field(format!("Route `{}`", key), listed)
            },
        )
    }

    fn status(&self, guild_id: GuildId, channels: &dyn ChannelDirectory) -> Reply {
        let routes = self.routes.routes_for(guild_id);
        let check = |channel_id: ChannelId| {
            if channels.channel_exists(guild_id, channel_id) {
                format!("{} ✅", mention(channel_id))
            } else {
                format!("Unknown ({}) ❌", channel_id)
            }
        };

        let reply = routes.iter().enumerate().fold(
            Reply::info(
                "📊 Dot Relay Status",
                format!(
                    "{} route(s) in this server, {} across all servers.",
                    routes.len(),
                    self.routes.total_routes()
                ),
            ),
            |reply, (i, route)| {
                reply.field(
                    format!("Setup #{}", i + 1),
                    format!(
                        "👀 Watch: {}\n📨 Forward: {}\n🔗 Webhooks: {}",
                        check(route.watch),
                        check(route.forward),
                        self.webhooks.endpoints(guild_id, &route.key()).len()
                    ),
                )
            },
        );

        let stats = self.stats.snapshot();
        reply.field(
            "Relay counters",
            format!(
                "Events relayed: {}\nRoutes delivered: {}\nChannel posts: {}\nWebhook deliveries: {} ok / {} failed\nFallbacks: {}\nUndelivered: {}\nUnconfirmed (timed out): {}\nMissing destinations: {}",
                stats.events,
                stats.routes_delivered,
                stats.channel_posts,
                stats.webhook_successes,
                stats.webhook_failures,
                stats.fallbacks,
                stats.undelivered,
                stats.unconfirmed,
                stats.missing_destinations
            ),
        )
    }

    async fn debug<P>(&self, guild_id: GuildId, platform: &P) -> anyhow::Result<Reply>
    where
        P: ChannelDirectory + RecentMessages,
    {
        let Some(route) = self.routes.routes_for(guild_id).first().copied() else {
            return Ok(Reply::info("ℹ️ No Setups Found", "No setups configured!"));
        };
        if !platform.channel_exists(guild_id, route.watch) {
            return Ok(Reply::info("ℹ️ Watch Channel Missing", "Watch channel not found!"));
        }

        let recent = platform
            .recent_messages(route.watch, DEBUG_HISTORY_LIMIT)
            .await?;
        Ok(self.debug_report(route.watch, &recent))
    }

    /// Describe how each automated message in `recent` is classified.
    pub fn debug_report(&self, watch: ChannelId, recent: &[InboundEvent]) -> Reply {
        let reply = Reply::info(
            "🔍 Debug: Recent Messages",
            format!("Showing last {} messages from {}", recent.len(), mention(watch)),
        );

        recent
            .iter()
            .filter(|event| event.author.automated)
            .fold(reply, |reply, event| {
                let mut lines: Vec<String> = if event.blocks.is_empty() {
                    let shown: String = event.content.chars().take(DEBUG_PREVIEW_CHARS).collect();
                    vec![format!("Text: `{}`", or_placeholder(&shown, "No content"))]
                } else {
                    event
                        .blocks
                        .iter()
                        .enumerate()
                        .map(|(i, block)| {
                            let shown = block
                                .description
                                .as_deref()
                                .map(|d| text::preview(d, DEBUG_PREVIEW_CHARS))
                                .unwrap_or_default();
                            format!("Embed {}: `{}`", i, or_placeholder(&shown, "No description"))
                        })
                        .collect()
                };

                lines.push(match self.classifier.verdict(event) {
                    Verdict::Forward(forwardable) => {
                        format!("Relay: forwarded as **{}**", forwardable.display_name)
                    }
                    Verdict::OwnMessage => "Relay: skipped (own message)".to_string(),
                    Verdict::HumanAuthor => "Relay: skipped (not a bot)".to_string(),
                    Verdict::NoDotEvent => "Relay: skipped (no dot event)".to_string(),
                });

                reply.field(format!("Bot: {}", event.author.name), lines.join("\n"))
            })
    }

    fn help(&self) -> Reply {
        let lines = COMMANDS
            .iter()
            .map(|spec| {
                let usage = format!("{}{} {}", self.prefix, spec.name, spec.args);
                format!("• `{}` - {}", usage.trim_end(), spec.about)
            })
            .collect::<Vec<_>>()
            .join("\n");
        Reply::info("**Available Commands:**", lines)
            .field("Permissions", "All commands require the Administrator permission.")
    }
}

fn mention(channel_id: ChannelId) -> String {
    format!("<#{}>", channel_id)
}

fn or_placeholder<'a>(shown: &'a str, placeholder: &'a str) -> &'a str {
    if shown.is_empty() {
        placeholder
    } else {
        shown
    }
}
