//! Process-lifetime relay counters, reported by the status command.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::relay::dispatcher::{DispatchReport, RouteOutcome};

#[derive(Debug, Default)]
pub struct RelayStats {
    events: AtomicU64,
    routes_delivered: AtomicU64,
    channel_posts: AtomicU64,
    webhook_successes: AtomicU64,
    webhook_failures: AtomicU64,
    fallbacks: AtomicU64,
    undelivered: AtomicU64,
    unconfirmed: AtomicU64,
    missing_destinations: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub events: u64,
    pub routes_delivered: u64,
    pub channel_posts: u64,
    pub webhook_successes: u64,
    pub webhook_failures: u64,
    pub fallbacks: u64,
    pub undelivered: u64,
    pub unconfirmed: u64,
    pub missing_destinations: u64,
}

impl RelayStats {
    pub fn record_webhook(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.webhook_successes
        } else {
            &self.webhook_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_post(&self) {
        self.channel_posts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dispatched event and the outcome of each of its routes.
    pub fn record_dispatch(&self, report: &DispatchReport) {
        self.events.fetch_add(1, Ordering::Relaxed);
        for (_, outcome) in &report.outcomes {
            let counter = match outcome {
                RouteOutcome::Webhooks { .. } | RouteOutcome::Channel => &self.routes_delivered,
                RouteOutcome::Fallback { .. } => {
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    &self.routes_delivered
                }
                RouteOutcome::DestinationMissing => &self.missing_destinations,
                RouteOutcome::Undelivered | RouteOutcome::Crashed => &self.undelivered,
                RouteOutcome::Unconfirmed => &self.unconfirmed,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            routes_delivered: self.routes_delivered.load(Ordering::Relaxed),
            channel_posts: self.channel_posts.load(Ordering::Relaxed),
            webhook_successes: self.webhook_successes.load(Ordering::Relaxed),
            webhook_failures: self.webhook_failures.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            unconfirmed: self.unconfirmed.load(Ordering::Relaxed),
            missing_destinations: self.missing_destinations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Route;

    #[test]
    fn test_record_dispatch_counts_outcomes() {
        let stats = RelayStats::default();
        stats.record_dispatch(&DispatchReport {
            outcomes: vec![
                (Route::new(1, 2), RouteOutcome::Channel),
                (Route::new(1, 3), RouteOutcome::Fallback { webhook_failures: 2 }),
                (Route::new(1, 4), RouteOutcome::DestinationMissing),
                (Route::new(1, 5), RouteOutcome::Crashed),
                (Route::new(1, 6), RouteOutcome::Unconfirmed),
            ],
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events, 1);
        assert_eq!(snapshot.routes_delivered, 2);
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.missing_destinations, 1);
        assert_eq!(snapshot.undelivered, 1);
        assert_eq!(snapshot.unconfirmed, 1);
    }

    #[test]
    fn test_webhook_counters() {
        let stats = RelayStats::default();
        stats.record_webhook(true);
        stats.record_webhook(false);
        stats.record_webhook(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.webhook_successes, 1);
        assert_eq!(snapshot.webhook_failures, 2);
    }
}
