//! Best-effort delivery of one message to every subscriber.
//!
//! Subscribers are fetched once; each delivery is attempted independently
//! and a failure for one recipient is logged and skipped.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::transport::{OutboundMessage, Transport};
use crate::watch::core::config::BroadcastConfig;
use crate::watch::core::errors::WatchResult;
use crate::watch::core::ids::ConversationId;
use crate::watch::storage::SubscriptionStore;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers a delivery was attempted for.
    pub attempted: usize,
    /// Successful deliveries.
    pub delivered: usize,
    /// Subscribers whose delivery failed.
    pub failed: Vec<ConversationId>,
}

/// Sends a message to all known subscribers.
pub struct Broadcaster {
    store: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn Transport>,
    concurrency: usize,
}

impl Broadcaster {
    /// Create a broadcaster over the shared store and transport.
    #[must_use]
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn Transport>,
        config: &BroadcastConfig,
    ) -> Self {
        Self {
            store,
            transport,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Deliver `text` to every subscriber.
    ///
    /// Delivery failures never abort the run; they are collected in the report.
    ///
    /// # Errors
    /// Returns an error only if the subscriber list cannot be read.
    pub async fn broadcast(&self, text: &str) -> WatchResult<BroadcastReport> {
        let subscribers = self.store.list_distinct_subscribers().await?;
        let attempted = subscribers.len();

        let outcomes: Vec<(ConversationId, bool)> = stream::iter(subscribers)
            .map(|conversation_id| {
                let message = OutboundMessage::new(conversation_id.clone(), text);
                async move {
                    match self.transport.send(message).await {
                        Ok(()) => (conversation_id, true),
                        Err(err) => {
                            warn!(
                                conversation_id = %conversation_id,
                                error_kind = err.kind(),
                                error = %err,
                                "Broadcast delivery failed"
                            );
                            (conversation_id, false)
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BroadcastReport {
            attempted,
            ..BroadcastReport::default()
        };
        for (conversation_id, delivered) in outcomes {
            if delivered {
                report.delivered += 1;
            } else {
                report.failed.push(conversation_id);
            }
        }
        report.failed.sort();

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Broadcast finished"
        );

        Ok(report)
    }

    /// Run one broadcast as a background task.
    #[must_use]
    pub fn spawn(self, text: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.broadcast(&text).await {
                warn!(
                    error_kind = err.kind(),
                    error = %err,
                    "Broadcast skipped: subscribers could not be listed"
                );
            }
        })
    }
}
