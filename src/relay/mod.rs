//! Relay core: classify inbound messages and deliver dot events.

pub mod classifier;
pub mod dispatcher;
pub mod stats;

pub use classifier::{Classifier, Verdict};
pub use dispatcher::{ChannelDirectory, DispatchReport, Dispatcher, RelaySink};
pub use stats::RelayStats;

use tracing::debug;

use crate::common::messages::InboundEvent;

/// Classifier and dispatcher joined into one message pipeline.
pub struct Relay<S> {
    classifier: Classifier,
    dispatcher: Dispatcher<S>,
}

impl<S: RelaySink> Relay<S> {
    pub fn new(classifier: Classifier, dispatcher: Dispatcher<S>) -> Self {
        Self {
            classifier,
            dispatcher,
        }
    }

    /// Relay one inbound message. Returns `None` when it was not forwardable.
    ///
    /// Messages outside a guild are never relayed.
    pub async fn process(&self, event: &InboundEvent) -> Option<DispatchReport> {
        let guild_id = event.guild_id?;
        let forwardable = self.classifier.classify(event)?;
        debug!(
            "Dot event for {} in channel {} of guild {}",
            forwardable.display_name, event.channel_id, guild_id
        );
        Some(
            self.dispatcher
                .dispatch(&forwardable, event.channel_id, guild_id)
                .await,
        )
    }
}
