//! Per-conversation event dispatch.
//!
//! Each conversation gets its own queue and worker task, so events from one
//! chat are handled strictly in arrival order while different chats proceed
//! concurrently. Workers retire after an idle period.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::transport::{InboundEvent, Transport};
use crate::watch::conversation::ConversationStateMachine;
use crate::watch::core::ids::ConversationId;

struct Shared {
    machine: Arc<ConversationStateMachine>,
    transport: Arc<dyn Transport>,
    queues: DashMap<ConversationId, UnboundedSender<InboundEvent>>,
    idle: Duration,
}

/// Routes inbound events to per-conversation workers.
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Create a dispatcher whose workers stop after `idle` without events.
    #[must_use]
    pub fn new(
        machine: Arc<ConversationStateMachine>,
        transport: Arc<dyn Transport>,
        idle: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                machine,
                transport,
                queues: DashMap::new(),
                idle,
            }),
        }
    }

    /// Queue an event behind earlier events of the same conversation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: InboundEvent) {
        let conversation_id = event.conversation_id.clone();

        let undelivered = {
            let sender = self
                .shared
                .queues
                .entry(conversation_id.clone())
                .or_insert_with(|| self.spawn_worker(conversation_id.clone()));
            match sender.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            }
        };

        // The worker is gone without having retired itself.
        warn!(conversation_id = %conversation_id, "Conversation worker vanished, restarting");
        let sender = self.spawn_worker(conversation_id.clone());
        if sender.send(undelivered).is_ok() {
            self.shared.queues.insert(conversation_id, sender);
        }
    }

    /// Number of conversations with a live worker.
    #[must_use]
    pub fn active_conversations(&self) -> usize {
        self.shared.queues.len()
    }

    fn spawn_worker(&self, conversation_id: ConversationId) -> UnboundedSender<InboundEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::clone(&self.shared);
        let own = sender.clone();
        debug!(conversation_id = %conversation_id, "Starting conversation worker");
        tokio::spawn(async move {
            shared.run_worker(conversation_id, receiver, own).await;
        });
        sender
    }
}

impl Shared {
    async fn run_worker(
        &self,
        conversation_id: ConversationId,
        mut receiver: UnboundedReceiver<InboundEvent>,
        own: UnboundedSender<InboundEvent>,
    ) {
        loop {
            match tokio::time::timeout(self.idle, receiver.recv()).await {
                Ok(Some(event)) => self.process(event).await,
                Ok(None) => break,
                Err(_elapsed) => {
                    // Sends happen under the map entry lock, so an empty queue
                    // observed here stays empty once the entry is gone.
                    let retired = self
                        .queues
                        .remove_if(&conversation_id, |_, sender| {
                            sender.same_channel(&own) && receiver.is_empty()
                        })
                        .is_some();
                    if retired {
                        debug!(conversation_id = %conversation_id, "Conversation worker retired");
                        break;
                    }
                }
            }
        }
    }

    async fn process(&self, event: InboundEvent) {
        let reply = self.machine.handle(&event).await;
        if let Err(err) = self.transport.send(reply).await {
            warn!(
                conversation_id = %event.conversation_id,
                error_kind = err.kind(),
                error = %err,
                "Reply delivery failed"
            );
        }
    }
}
