//! Long-polling loop that feeds Telegram updates to the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::bot::dispatcher::Dispatcher;
use crate::transport::{TelegramTransport, Update};

/// Polls for updates until shutdown is signaled.
pub struct BotRunner {
    transport: Arc<TelegramTransport>,
    dispatcher: Dispatcher,
    shutdown: Arc<Notify>,
    retry_delay: Duration,
}

impl BotRunner {
    /// Create a runner; `retry_delay` is the pause after a failed poll.
    #[must_use]
    pub fn new(
        transport: Arc<TelegramTransport>,
        dispatcher: Dispatcher,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            shutdown: Arc::new(Notify::new()),
            retry_delay,
        }
    }

    /// Get a shutdown notifier to stop the polling loop.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the polling loop until shutdown is signaled.
    ///
    /// Poll failures are logged and retried after the configured delay.
    pub async fn run(self) {
        info!("Polling for updates");
        let mut offset: Option<i64> = None;

        loop {
            tokio::select! {
                polled = self.transport.get_updates(offset) => {
                    match polled {
                        Ok(updates) => {
                            offset = self.dispatch_all(updates).or(offset);
                        }
                        Err(err) => {
                            warn!(
                                error_kind = err.kind(),
                                error = %err,
                                delay = ?self.retry_delay,
                                "Polling failed"
                            );
                            tokio::select! {
                                () = tokio::time::sleep(self.retry_delay) => {}
                                () = self.shutdown.notified() => break,
                            }
                        }
                    }
                }
                () = self.shutdown.notified() => break,
            }
        }

        info!("Polling stopped");
    }

    /// Dispatch a batch and return the offset acknowledging it.
    fn dispatch_all(&self, updates: Vec<Update>) -> Option<i64> {
        let next_offset = next_offset(&updates);
        for update in updates {
            let update_id = update.update_id;
            match update.into_event() {
                Some(event) => self.dispatcher.dispatch(event),
                None => debug!(update_id, "Skipping update without a message"),
            }
        }
        next_offset
    }
}

fn next_offset(updates: &[Update]) -> Option<i64> {
    updates.iter().map(|update| update.update_id + 1).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(update_id: i64) -> Update {
        serde_json::from_value(serde_json::json!({ "update_id": update_id })).unwrap()
    }

    #[test]
    fn test_next_offset_acknowledges_highest_update() {
        let updates = vec![update(7), update(9), update(8)];
        assert_eq!(next_offset(&updates), Some(10));
    }

    #[test]
    fn test_next_offset_of_empty_batch() {
        assert_eq!(next_offset(&[]), None);
    }
}
