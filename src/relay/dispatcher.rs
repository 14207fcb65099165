//! Relay dispatcher.
//!
//! Fans a forwardable event out to every route watching the origin channel.
//! Per route, delivery goes to the registered webhooks in order, falling back
//! to the forward channel only if every webhook failed, or straight to the
//! forward channel when no webhook is registered. At most one payload is
//! delivered per route.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serenity::async_trait;
use tracing::{debug, error, info, warn};

use crate::common::error::{DeliveryError, DeliveryResult};
use crate::common::messages::{ForwardableEvent, RelayPayload};
use crate::common::types::{ChannelId, GuildId, Route};
use crate::relay::stats::RelayStats;
use crate::store::{mask_webhook_url, RouteStore, WebhookRegistry};

/// Synchronous view of which channels exist.
pub trait ChannelDirectory: Send + Sync {
    /// Whether the channel currently exists in the guild.
    fn channel_exists(&self, guild_id: GuildId, channel_id: ChannelId) -> bool;
}

/// Outbound side of the relay.
#[async_trait]
pub trait RelaySink: ChannelDirectory + 'static {
    /// Post the payload into a channel of the guild.
    async fn post_to_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        payload: &RelayPayload,
    ) -> DeliveryResult;

    /// Execute a webhook with the payload.
    async fn post_to_webhook(&self, url: &str, payload: &RelayPayload) -> DeliveryResult;
}

/// What happened to one route for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forward channel no longer exists; nothing attempted.
    DestinationMissing,
    /// At least one webhook accepted the payload.
    Webhooks { succeeded: usize, failed: usize },
    /// No webhooks registered; posted to the forward channel.
    Channel,
    /// Every webhook failed; posted to the forward channel instead.
    Fallback { webhook_failures: usize },
    /// Nothing could be delivered.
    Undelivered,
    /// Nothing was confirmed, but an attempt timed out and may have landed.
    Unconfirmed,
    /// The route's task panicked.
    Crashed,
}

impl RouteOutcome {
    pub fn delivered(&self) -> bool {
        matches!(
            self,
            RouteOutcome::Webhooks { .. } | RouteOutcome::Channel | RouteOutcome::Fallback { .. }
        )
    }
}

/// Per-route results of one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub outcomes: Vec<(Route, RouteOutcome)>,
}

impl DispatchReport {
    pub fn delivered_routes(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.delivered()).count()
    }
}

/// Routes forwardable events to channels and webhooks.
pub struct Dispatcher<S> {
    routes: Arc<RouteStore>,
    webhooks: Arc<WebhookRegistry>,
    sink: Arc<S>,
    stats: Arc<RelayStats>,
    delivery_timeout: Duration,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            webhooks: Arc::clone(&self.webhooks),
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
            delivery_timeout: self.delivery_timeout,
        }
    }
}

impl<S: RelaySink> Dispatcher<S> {
    pub fn new(
        routes: Arc<RouteStore>,
        webhooks: Arc<WebhookRegistry>,
        sink: Arc<S>,
        stats: Arc<RelayStats>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            routes,
            webhooks,
            sink,
            stats,
            delivery_timeout,
        }
    }

    /// Deliver `event` along every route of `guild_id` watching `origin_channel`.
    ///
    /// Never fails: every problem is logged and reflected in the report.
    pub async fn dispatch(
        &self,
        event: &ForwardableEvent,
        origin_channel: ChannelId,
        guild_id: GuildId,
    ) -> DispatchReport {
        // Snapshot routes and their endpoints once; later store writes
        // do not affect an in-flight dispatch.
        let plans: Vec<(Route, Vec<String>)> = self
            .routes
            .routes_watching(guild_id, origin_channel)
            .into_iter()
            .map(|route| {
                let endpoints = self.webhooks.endpoints(guild_id, &route.key());
                (route, endpoints)
            })
            .collect();

        if plans.is_empty() {
            debug!(
                "No routes watch channel {} in guild {}",
                origin_channel, guild_id
            );
            return DispatchReport::default();
        }

        let event = Arc::new(event.clone());
        let tasks = plans.into_iter().map(|(route, endpoints)| {
            let dispatcher = self.clone();
            let event = Arc::clone(&event);
            let handle = tokio::spawn(async move {
                dispatcher
                    .relay_route(guild_id, route, &endpoints, &event)
                    .await
            });
            async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(
                            guild = guild_id,
                            route = %route.key(),
                            "Route relay task failed: {}",
                            e
                        );
                        RouteOutcome::Crashed
                    }
                };
                (route, outcome)
            }
        });

        let report = DispatchReport {
            outcomes: join_all(tasks).await,
        };
        self.stats.record_dispatch(&report);
        report
    }

    /// Deliver the event along one route, trying later payloads only while
    /// nothing has been delivered for this route yet.
    async fn relay_route(
        &self,
        guild_id: GuildId,
        route: Route,
        endpoints: &[String],
        event: &ForwardableEvent,
    ) -> RouteOutcome {
        if !self.sink.channel_exists(guild_id, route.forward) {
            warn!(
                guild = guild_id,
                route = %route.key(),
                "Forward channel {} not found, skipping route",
                route.forward
            );
            return RouteOutcome::DestinationMissing;
        }

        let mut outcome = RouteOutcome::Undelivered;
        for payload in event.payloads() {
            outcome = self.deliver(guild_id, route, endpoints, payload).await;
            if outcome.delivered() {
                info!(
                    guild = guild_id,
                    route = %route.key(),
                    "Relayed event for {}: {:?}",
                    event.display_name,
                    outcome
                );
                break;
            }
            if outcome == RouteOutcome::Unconfirmed {
                // A timed-out post may still show up; another block could double it.
                warn!(
                    guild = guild_id,
                    route = %route.key(),
                    "Delivery for {} unconfirmed, not trying further blocks",
                    event.display_name
                );
                break;
            }
        }
        outcome
    }

    async fn deliver(
        &self,
        guild_id: GuildId,
        route: Route,
        endpoints: &[String],
        payload: &RelayPayload,
    ) -> RouteOutcome {
        if endpoints.is_empty() {
            return match self.post_channel(guild_id, route, payload).await {
                Ok(()) => RouteOutcome::Channel,
                Err(e) => unsettled(is_timeout(&e)),
            };
        }

        let mut succeeded = 0;
        let mut failed = 0;
        let mut timed_out = false;
        for url in endpoints {
            let attempt = self.sink.post_to_webhook(url, payload);
            match self.bounded(attempt).await {
                Ok(()) => {
                    self.stats.record_webhook(true);
                    succeeded += 1;
                }
                Err(e) => {
                    self.stats.record_webhook(false);
                    timed_out |= is_timeout(&e);
                    warn!(
                        guild = guild_id,
                        route = %route.key(),
                        endpoint = %mask_webhook_url(url),
                        "Webhook delivery failed: {}",
                        e
                    );
                    failed += 1;
                }
            }
        }

        if succeeded > 0 {
            return RouteOutcome::Webhooks { succeeded, failed };
        }

        debug!(
            guild = guild_id,
            route = %route.key(),
            "All {} webhook(s) failed, falling back to channel",
            failed
        );
        match self.post_channel(guild_id, route, payload).await {
            Ok(()) => RouteOutcome::Fallback {
                webhook_failures: failed,
            },
            Err(e) => unsettled(timed_out || is_timeout(&e)),
        }
    }

    async fn post_channel(&self, guild_id: GuildId, route: Route, payload: &RelayPayload) -> DeliveryResult {
        let attempt = self.sink.post_to_channel(guild_id, route.forward, payload);
        let result = self.bounded(attempt).await;
        match &result {
            Ok(()) => self.stats.record_channel_post(),
            Err(e) => warn!(
                guild = guild_id,
                route = %route.key(),
                channel = route.forward,
                "Channel delivery failed: {}",
                e
            ),
        }
        result
    }

    /// Apply the per-attempt timeout; a timeout counts as a failed attempt.
    async fn bounded(&self, attempt: impl Future<Output = DeliveryResult>) -> DeliveryResult {
        match tokio::time::timeout(self.delivery_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.delivery_timeout)),
        }
    }
}

fn is_timeout(error: &DeliveryError) -> bool {
    matches!(error, DeliveryError::Timeout(_))
}

/// Outcome of a payload nothing accepted.
fn unsettled(timed_out: bool) -> RouteOutcome {
    if timed_out {
        RouteOutcome::Unconfirmed
    } else {
        RouteOutcome::Undelivered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use chrono::DateTime;

    use super::*;
    use crate::common::messages::{RichContent, TextPayload};

    pub(crate) const HOOK_1: &str = "https://discord.com/api/webhooks/111111111111111111/one";
    pub(crate) const HOOK_2: &str = "https://discord.com/api/webhooks/222222222222222222/two";

    const GUILD: GuildId = 100;
    const WATCH: ChannelId = 10;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Delivery {
        Channel(ChannelId, RelayPayload),
        Webhook(String, RelayPayload),
    }

    /// In-memory sink recording every successful delivery.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub deliveries: Mutex<Vec<Delivery>>,
        pub webhook_attempts: Mutex<Vec<String>>,
        pub failing_webhooks: HashSet<String>,
        pub slow_webhooks: HashSet<String>,
        pub failing_channels: HashSet<ChannelId>,
        /// Channels that accept the post and then hang before answering.
        pub stalling_channels: HashSet<ChannelId>,
        pub missing_channels: HashSet<ChannelId>,
        /// Runs inside every webhook attempt, before it resolves.
        pub on_webhook: Option<Box<dyn Fn() + Send + Sync>>,
    }

    impl RecordingSink {
        pub fn deliveries(&self) -> Vec<Delivery> {
            self.deliveries.lock().unwrap().clone()
        }

        pub fn channel_posts(&self) -> usize {
            self.deliveries()
                .iter()
                .filter(|d| matches!(d, Delivery::Channel(..)))
                .count()
        }
    }

    impl ChannelDirectory for RecordingSink {
        fn channel_exists(&self, _guild_id: GuildId, channel_id: ChannelId) -> bool {
            !self.missing_channels.contains(&channel_id)
        }
    }

    #[async_trait]
    impl RelaySink for RecordingSink {
        async fn post_to_channel(
            &self,
            _guild_id: GuildId,
            channel_id: ChannelId,
            payload: &RelayPayload,
        ) -> DeliveryResult {
            if self.failing_channels.contains(&channel_id) {
                return Err(DeliveryError::ChannelNotFound { channel_id });
            }
            self.deliveries
                .lock()
                .unwrap()
                .push(Delivery::Channel(channel_id, payload.clone()));
            if self.stalling_channels.contains(&channel_id) {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Ok(())
        }

        async fn post_to_webhook(&self, url: &str, payload: &RelayPayload) -> DeliveryResult {
            self.webhook_attempts.lock().unwrap().push(url.to_string());
            if let Some(hook) = &self.on_webhook {
                hook();
            }
            if self.slow_webhooks.contains(url) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.failing_webhooks.contains(url) {
                return Err(DeliveryError::EndpointNotFound);
            }
            self.deliveries
                .lock()
                .unwrap()
                .push(Delivery::Webhook(url.to_string(), payload.clone()));
            Ok(())
        }
    }

    pub(crate) struct Fixture {
        pub _dir: tempfile::TempDir,
        pub routes: Arc<RouteStore>,
        pub webhooks: Arc<WebhookRegistry>,
        pub stats: Arc<RelayStats>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let routes = Arc::new(RouteStore::open(dir.path().join("routes.json")).unwrap());
            let webhooks = Arc::new(WebhookRegistry::open(dir.path().join("hooks.json")).unwrap());
            Self {
                _dir: dir,
                routes,
                webhooks,
                stats: Arc::new(RelayStats::default()),
            }
        }

        pub fn dispatcher(&self, sink: RecordingSink) -> (Dispatcher<RecordingSink>, Arc<RecordingSink>) {
            let sink = Arc::new(sink);
            let dispatcher = Dispatcher::new(
                Arc::clone(&self.routes),
                Arc::clone(&self.webhooks),
                Arc::clone(&sink),
                Arc::clone(&self.stats),
                Duration::from_millis(200),
            );
            (dispatcher, sink)
        }
    }

    fn text_event(text: &str) -> ForwardableEvent {
        ForwardableEvent::new(
            "Bob",
            RelayPayload::Text(TextPayload {
                content: text.to_string(),
                display_name: "Bob".to_string(),
                avatar_url: None,
                created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            }),
        )
    }

    fn rich(description: &str) -> RelayPayload {
        RelayPayload::Rich(RichContent {
            description: Some(description.to_string()),
            ..RichContent::default()
        })
    }

    #[tokio::test]
    async fn test_no_routes_is_noop() {
        let fixture = Fixture::new();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink::default());

        let report = dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;
        assert!(report.outcomes.is_empty());
        assert!(sink.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_single_route_without_webhooks_posts_once() {
        let fixture = Fixture::new();
        fixture.routes.add(GUILD, Route::new(WATCH, 20)).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink::default());

        let event = text_event(".Bob joined");
        let report = dispatcher.dispatch(&event, WATCH, GUILD).await;

        assert_eq!(report.outcomes, vec![(Route::new(WATCH, 20), RouteOutcome::Channel)]);
        assert_eq!(sink.deliveries(), vec![Delivery::Channel(20, event.payload.clone())]);
    }

    #[tokio::test]
    async fn test_other_channel_or_guild_not_relayed() {
        let fixture = Fixture::new();
        fixture.routes.add(GUILD, Route::new(WATCH, 20)).unwrap();
        fixture.routes.add(GUILD + 1, Route::new(WATCH, 21)).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink::default());

        dispatcher.dispatch(&text_event(".Bob joined"), 99, GUILD).await;
        assert!(sink.deliveries().is_empty());

        dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD + 1).await;
        assert_eq!(sink.deliveries().len(), 1);
        assert!(matches!(sink.deliveries()[0], Delivery::Channel(21, _)));
    }

    #[tokio::test]
    async fn test_all_webhooks_failing_falls_back_once() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_2).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            failing_webhooks: [HOOK_1.to_string(), HOOK_2.to_string()].into(),
            ..RecordingSink::default()
        });

        let report = dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        assert_eq!(
            report.outcomes[0].1,
            RouteOutcome::Fallback { webhook_failures: 2 }
        );
        assert_eq!(sink.channel_posts(), 1);
        assert_eq!(sink.webhook_attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_webhook_success_suppresses_fallback() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_2).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            failing_webhooks: [HOOK_1.to_string()].into(),
            ..RecordingSink::default()
        });

        let report = dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        assert_eq!(
            report.outcomes[0].1,
            RouteOutcome::Webhooks { succeeded: 1, failed: 1 }
        );
        assert_eq!(sink.channel_posts(), 0);
        // The failing endpoint does not stop the next one from being tried
        assert_eq!(
            *sink.webhook_attempts.lock().unwrap(),
            vec![HOOK_1.to_string(), HOOK_2.to_string()]
        );
    }

    #[tokio::test]
    async fn test_webhooks_attempted_in_registration_order() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_2).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink::default());

        dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        let urls: Vec<String> = sink
            .deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Webhook(url, _) => Some(url),
                _ => None,
            })
            .collect();
        assert_eq!(urls, vec![HOOK_2.to_string(), HOOK_1.to_string()]);
        assert_eq!(sink.channel_posts(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_webhook_counts_as_failure() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            slow_webhooks: [HOOK_1.to_string()].into(),
            ..RecordingSink::default()
        });

        let report = dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        assert_eq!(
            report.outcomes[0].1,
            RouteOutcome::Fallback { webhook_failures: 1 }
        );
        assert_eq!(sink.channel_posts(), 1);
    }

    #[tokio::test]
    async fn test_two_qualifying_blocks_deliver_once_per_route() {
        let fixture = Fixture::new();
        fixture.routes.add(GUILD, Route::new(WATCH, 20)).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink::default());

        let mut event = ForwardableEvent::new("Alice", rich("**.Alice** joined"));
        event.alternates.push(rich("**.Alice** joined (again)"));

        dispatcher.dispatch(&event, WATCH, GUILD).await;
        assert_eq!(sink.deliveries(), vec![Delivery::Channel(20, rich("**.Alice** joined"))]);
    }

    #[tokio::test]
    async fn test_alternate_payload_tried_when_first_undeliverable() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            failing_webhooks: [HOOK_1.to_string()].into(),
            failing_channels: [20].into(),
            ..RecordingSink::default()
        });

        let mut event = ForwardableEvent::new("Alice", rich("first"));
        event.alternates.push(rich("second"));

        let report = dispatcher.dispatch(&event, WATCH, GUILD).await;
        assert_eq!(report.outcomes[0].1, RouteOutcome::Undelivered);
        // Both payloads were attempted against the webhook, each once
        assert_eq!(sink.webhook_attempts.lock().unwrap().len(), 2);
        assert!(sink.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_isolates_route_failures() {
        let fixture = Fixture::new();
        fixture.routes.add(GUILD, Route::new(WATCH, 20)).unwrap();
        fixture.routes.add(GUILD, Route::new(WATCH, 30)).unwrap();
        fixture.routes.add(GUILD, Route::new(WATCH, 40)).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            failing_channels: [20].into(),
            missing_channels: [40].into(),
            ..RecordingSink::default()
        });

        let report = dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        assert_eq!(
            report.outcomes,
            vec![
                (Route::new(WATCH, 20), RouteOutcome::Undelivered),
                (Route::new(WATCH, 30), RouteOutcome::Channel),
                (Route::new(WATCH, 40), RouteOutcome::DestinationMissing),
            ]
        );
        assert_eq!(report.delivered_routes(), 1);
        assert!(matches!(sink.deliveries()[..], [Delivery::Channel(30, _)]));
    }

    #[tokio::test]
    async fn test_stats_recorded() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();
        let (dispatcher, _sink) = fixture.dispatcher(RecordingSink {
            failing_webhooks: [HOOK_1.to_string()].into(),
            ..RecordingSink::default()
        });

        dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        let stats = fixture.stats.snapshot();
        assert_eq!(stats.webhook_failures, 1);
        assert_eq!(stats.webhook_successes, 0);
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.channel_posts, 1);
    }

    #[tokio::test]
    async fn test_stalled_post_does_not_trigger_second_block() {
        let fixture = Fixture::new();
        fixture.routes.add(GUILD, Route::new(WATCH, 20)).unwrap();
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            stalling_channels: [20].into(),
            ..RecordingSink::default()
        });

        let mut event = ForwardableEvent::new("Alice", rich("**.Alice** joined"));
        event.alternates.push(rich("**.Alice** joined (again)"));

        let report = dispatcher.dispatch(&event, WATCH, GUILD).await;

        assert_eq!(report.outcomes[0].1, RouteOutcome::Unconfirmed);
        assert_eq!(sink.deliveries(), vec![Delivery::Channel(20, rich("**.Alice** joined"))]);
        let stats = fixture.stats.snapshot();
        assert_eq!(stats.unconfirmed, 1);
        assert_eq!(stats.undelivered, 0);
    }

    #[tokio::test]
    async fn test_store_writes_during_dispatch_apply_to_next_event() {
        let fixture = Fixture::new();
        let route = Route::new(WATCH, 20);
        fixture.routes.add(GUILD, route).unwrap();
        fixture.webhooks.add(GUILD, &route.key(), HOOK_1).unwrap();

        let routes = Arc::clone(&fixture.routes);
        let webhooks = Arc::clone(&fixture.webhooks);
        let (dispatcher, sink) = fixture.dispatcher(RecordingSink {
            on_webhook: Some(Box::new(move || {
                routes.add(GUILD, Route::new(WATCH, 30)).unwrap();
                webhooks.add(GUILD, &route.key(), HOOK_2).unwrap();
            })),
            ..RecordingSink::default()
        });

        let report = dispatcher.dispatch(&text_event(".Bob joined"), WATCH, GUILD).await;

        assert_eq!(
            report.outcomes,
            vec![(route, RouteOutcome::Webhooks { succeeded: 1, failed: 0 })]
        );
        assert_eq!(*sink.webhook_attempts.lock().unwrap(), vec![HOOK_1.to_string()]);
        assert_eq!(sink.channel_posts(), 0);

        // The next event sees both writes
        let report = dispatcher.dispatch(&text_event(".Bob left"), WATCH, GUILD).await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(sink.channel_posts(), 1);
        assert_eq!(
            sink.webhook_attempts.lock().unwrap()[1..],
            [HOOK_1.to_string(), HOOK_2.to_string()]
        );
    }
}
