//! Conversation state machine.
//!
//! Turns a command followed by a free-text answer into one logical store
//! operation. The pending state of a conversation is taken out of the map
//! before every message is handled, so any message that is not the expected
//! answer leaves the conversation `Idle`, and a new command always replaces
//! whatever prompt was in flight.
//!
//! Messages of one conversation must be handled one at a time, in arrival
//! order; the [`crate::bot::Dispatcher`] guarantees that.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::transport::types::{InboundEvent, OutboundMessage, ReplyKeyboard};
use crate::watch::conversation::command::Command;
use crate::watch::conversation::replies;
use crate::watch::conversation::state::ConversationState;
use crate::watch::core::config::ConversationConfig;
use crate::watch::core::errors::WatchError;
use crate::watch::core::ids::ConversationId;
use crate::watch::filter::FilterValidator;
use crate::watch::storage::SubscriptionStore;

#[derive(Clone, Copy, Debug)]
struct PendingEntry {
    state: ConversationState,
    since: Instant,
}

/// Per-conversation command interpreter.
pub struct ConversationStateMachine {
    store: Arc<dyn SubscriptionStore>,
    validator: FilterValidator,
    pending: DashMap<ConversationId, PendingEntry>,
    pending_timeout: Option<Duration>,
    bot_username: Option<String>,
}

impl ConversationStateMachine {
    /// Create a machine over the shared subscription store.
    #[must_use]
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        validator: FilterValidator,
        config: &ConversationConfig,
    ) -> Self {
        Self {
            store,
            validator,
            pending: DashMap::new(),
            pending_timeout: config.pending_timeout_seconds.map(Duration::from_secs),
            bot_username: None,
        }
    }

    /// Only accept `/command@name` suffixes that name this bot.
    #[must_use]
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Current state of a conversation.
    #[must_use]
    pub fn state(&self, conversation_id: &ConversationId) -> ConversationState {
        self.pending.remove_if(conversation_id, |_, entry| self.is_expired(entry));
        self.pending
            .get(conversation_id)
            .map_or(ConversationState::Idle, |entry| entry.state)
    }

    /// Number of conversations waiting for an answer.
    ///
    /// Expired prompts are dropped first and never counted.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.prune_expired();
        self.pending.len()
    }

    /// Handle one inbound message and produce the reply.
    ///
    /// Never fails: invalid input and store failures become user-facing replies.
    pub async fn handle(&self, event: &InboundEvent) -> OutboundMessage {
        let conversation_id = &event.conversation_id;
        let previous = self.take_state(conversation_id);

        let reply = match event.command_for(self.bot_username.as_deref()) {
            Some(command) => self.run_command(command, event).await,
            None => self.answer(previous, event).await,
        };

        debug!(
            conversation_id = %conversation_id,
            previous = %previous,
            next = %self.state(conversation_id),
            "Handled message"
        );

        reply
    }

    fn is_expired(&self, entry: &PendingEntry) -> bool {
        self.pending_timeout.is_some_and(|timeout| entry.since.elapsed() >= timeout)
    }

    fn live_state(&self, entry: PendingEntry) -> ConversationState {
        if self.is_expired(&entry) {
            ConversationState::Idle
        } else {
            entry.state
        }
    }

    fn prune_expired(&self) {
        if self.pending_timeout.is_some() {
            self.pending.retain(|_, entry| !self.is_expired(entry));
        }
    }

    fn take_state(&self, conversation_id: &ConversationId) -> ConversationState {
        self.pending
            .remove(conversation_id)
            .map_or(ConversationState::Idle, |(_, entry)| self.live_state(entry))
    }

    fn enter(&self, conversation_id: &ConversationId, state: ConversationState) {
        self.prune_expired();
        self.pending.insert(
            conversation_id.clone(),
            PendingEntry {
                state,
                since: Instant::now(),
            },
        );
    }

    async fn run_command(&self, command: Command, event: &InboundEvent) -> OutboundMessage {
        let conversation_id = &event.conversation_id;
        match command {
            Command::Start => OutboundMessage::new(
                conversation_id.clone(),
                replies::greeting(event.sender_name.as_deref()),
            ),
            Command::Info => self.info(conversation_id).await,
            Command::Watch => {
                self.enter(conversation_id, ConversationState::AwaitingWatchPattern);
                OutboundMessage::new(conversation_id.clone(), replies::WATCH_PROMPT)
                    .with_keyboard(ReplyKeyboard::Remove)
            }
            Command::Unwatch => {
                self.enter(conversation_id, ConversationState::AwaitingUnwatchPattern);
                OutboundMessage::new(conversation_id.clone(), replies::UNWATCH_PROMPT)
                    .with_keyboard(ReplyKeyboard::Remove)
            }
            Command::Reset => {
                self.enter(conversation_id, ConversationState::AwaitingResetConfirmation);
                OutboundMessage::new(conversation_id.clone(), replies::RESET_PROMPT)
                    .with_keyboard(ReplyKeyboard::yes_no())
            }
        }
    }

    async fn answer(&self, previous: ConversationState, event: &InboundEvent) -> OutboundMessage {
        match (previous, event.text_content()) {
            (ConversationState::AwaitingWatchPattern, Some(text)) => {
                self.watch_pattern(event, text).await
            }
            (ConversationState::AwaitingUnwatchPattern, Some(text)) => {
                self.unwatch_pattern(event, text).await
            }
            (ConversationState::AwaitingResetConfirmation, Some(text))
                if text.to_lowercase() == "yes" =>
            {
                self.reset(&event.conversation_id).await
            }
            _ => Self::echo(event),
        }
    }

    async fn info(&self, conversation_id: &ConversationId) -> OutboundMessage {
        match self.store.list(conversation_id).await {
            Ok(subscriptions) => OutboundMessage::new(
                conversation_id.clone(),
                replies::subscription_list(&subscriptions),
            ),
            Err(err) => Self::storage_failure("list", conversation_id, &err),
        }
    }

    async fn watch_pattern(&self, event: &InboundEvent, text: &str) -> OutboundMessage {
        let conversation_id = &event.conversation_id;
        let pattern = match self.validator.normalize(text) {
            Ok(pattern) => pattern,
            Err(err) => return Self::invalid_filter(event, &err),
        };

        match self.store.add(conversation_id, &pattern).await {
            Ok(()) => {
                info!(conversation_id = %conversation_id, pattern = %pattern, "Subscription added");
                OutboundMessage::new(conversation_id.clone(), replies::watching(&pattern))
                    .in_reply_to(event.message_id)
            }
            Err(err) => Self::storage_failure("add", conversation_id, &err),
        }
    }

    async fn unwatch_pattern(&self, event: &InboundEvent, text: &str) -> OutboundMessage {
        let conversation_id = &event.conversation_id;
        let pattern = match self.validator.normalize(text) {
            Ok(pattern) => pattern,
            Err(err) => return Self::invalid_filter(event, &err),
        };

        match self.store.remove(conversation_id, &pattern).await {
            Ok(()) => {
                info!(conversation_id = %conversation_id, pattern = %pattern, "Subscription removed");
                OutboundMessage::new(conversation_id.clone(), replies::unsubscribed(&pattern))
                    .in_reply_to(event.message_id)
            }
            Err(err) => Self::storage_failure("remove", conversation_id, &err),
        }
    }

    async fn reset(&self, conversation_id: &ConversationId) -> OutboundMessage {
        match self.store.remove_all(conversation_id).await {
            Ok(()) => {
                info!(conversation_id = %conversation_id, "All subscriptions removed");
                OutboundMessage::new(conversation_id.clone(), replies::RESET_DONE)
                    .with_keyboard(ReplyKeyboard::Remove)
            }
            Err(err) => Self::storage_failure("remove_all", conversation_id, &err),
        }
    }

    fn echo(event: &InboundEvent) -> OutboundMessage {
        let text = event
            .text_content()
            .map_or_else(|| replies::UNSUPPORTED_CONTENT.to_string(), replies::escape_html);
        OutboundMessage::new(event.conversation_id.clone(), text)
            .with_keyboard(ReplyKeyboard::Remove)
    }

    fn invalid_filter(event: &InboundEvent, err: &WatchError) -> OutboundMessage {
        debug!(conversation_id = %event.conversation_id, error = %err, "Rejected filter");
        OutboundMessage::new(event.conversation_id.clone(), replies::INVALID_FILTER)
            .in_reply_to(event.message_id)
    }

    fn storage_failure(
        operation: &'static str,
        conversation_id: &ConversationId,
        err: &WatchError,
    ) -> OutboundMessage {
        error!(
            operation,
            conversation_id = %conversation_id,
            error_kind = err.kind(),
            error = %err,
            "Subscription store failed"
        );
        OutboundMessage::new(conversation_id.clone(), replies::STORAGE_FAILURE)
            .with_keyboard(ReplyKeyboard::Remove)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use super::*;
    use crate::watch::core::config::StorageConfig;
    use crate::watch::core::errors::WatchResult;
    use crate::watch::core::subscription::Subscription;
    use crate::watch::storage::{SqliteSubscriptionStore, StoreFuture};

    async fn memory_store() -> Arc<SqliteSubscriptionStore> {
        let config = StorageConfig {
            sqlite_path: PathBuf::from(":memory:"),
            ..StorageConfig::default()
        };
        Arc::new(SqliteSubscriptionStore::new(&config).await.unwrap())
    }

    fn machine_over(
        store: Arc<dyn SubscriptionStore>,
        config: &ConversationConfig,
    ) -> ConversationStateMachine {
        ConversationStateMachine::new(store, FilterValidator::new().unwrap(), config)
    }

    async fn machine() -> (ConversationStateMachine, Arc<SqliteSubscriptionStore>) {
        let store = memory_store().await;
        let machine = machine_over(store.clone(), &ConversationConfig::default());
        (machine, store)
    }

    async fn send(machine: &ConversationStateMachine, id: &str, text: &str) -> OutboundMessage {
        machine.handle(&InboundEvent::text(id, text)).await
    }

    struct FailingStore;

    fn failed<T: Send + 'static>() -> StoreFuture<'static, WatchResult<T>> {
        Box::pin(async {
            let result: WatchResult<T> =
                Err(WatchError::InvalidRecord("disk I/O error".to_string()));
            result
        })
    }

    impl SubscriptionStore for FailingStore {
        fn add(&self, _: &ConversationId, _: &str) -> StoreFuture<'_, WatchResult<()>> {
            failed()
        }

        fn exists(&self, _: &ConversationId, _: &str) -> StoreFuture<'_, WatchResult<bool>> {
            failed()
        }

        fn list(&self, _: &ConversationId) -> StoreFuture<'_, WatchResult<Vec<Subscription>>> {
            failed()
        }

        fn remove(&self, _: &ConversationId, _: &str) -> StoreFuture<'_, WatchResult<()>> {
            failed()
        }

        fn remove_all(&self, _: &ConversationId) -> StoreFuture<'_, WatchResult<()>> {
            failed()
        }

        fn list_distinct_subscribers(
            &self,
        ) -> StoreFuture<'_, WatchResult<BTreeSet<ConversationId>>> {
            failed()
        }
    }

    #[tokio::test]
    async fn test_watch_then_info() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("1231wq");

        let reply = send(&machine, "1231wq", "/watch").await;
        assert_eq!(reply.text, replies::WATCH_PROMPT);
        assert_eq!(reply.keyboard, Some(ReplyKeyboard::Remove));
        assert_eq!(machine.state(&id), ConversationState::AwaitingWatchPattern);

        let reply = send(&machine, "1231wq", "ur3amp").await;
        assert_eq!(reply.text, "Watching for 'UR3AMP'");
        assert_eq!(machine.state(&id), ConversationState::Idle);
        assert!(store.exists(&id, "UR3AMP").await.unwrap());

        let reply = send(&machine, "1231wq", "/info").await;
        assert_eq!(reply.text, "You have <b>1</b> subscriptions:\n    UR3AMP");
        assert_eq!(machine.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_filter_returns_to_idle() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        let reply = send(&machine, "42", "bad filter!").await;

        assert_eq!(reply.text, replies::INVALID_FILTER);
        assert_eq!(machine.state(&id), ConversationState::Idle);
        assert!(store.list(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pattern_reply_threads_to_message() {
        let (machine, _store) = machine().await;

        send(&machine, "42", "/watch").await;
        let reply = machine
            .handle(&InboundEvent::text("42", "pd5mi").with_message_id(77))
            .await;

        assert_eq!(reply.text, "Watching for 'PD5MI'");
        assert_eq!(reply.reply_to_message_id, Some(77));
    }

    #[tokio::test]
    async fn test_unwatch_removes_pattern() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");
        store.add(&id, "UR3AMP").await.unwrap();
        store.add(&id, "PD5MI").await.unwrap();

        let reply = send(&machine, "42", "/unwatch").await;
        assert_eq!(reply.text, replies::UNWATCH_PROMPT);
        assert_eq!(machine.state(&id), ConversationState::AwaitingUnwatchPattern);

        let reply = send(&machine, "42", "Ur3Amp").await;
        assert_eq!(reply.text, "Unsubscribed from 'UR3AMP'");
        assert_eq!(machine.state(&id), ConversationState::Idle);

        let remaining = store.list(&id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pattern, "PD5MI");
    }

    #[tokio::test]
    async fn test_unwatch_unknown_pattern_still_confirms() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");
        store.add(&id, "UR3AMP").await.unwrap();

        send(&machine, "42", "/unwatch").await;
        let reply = send(&machine, "42", "PD5MI").await;

        assert_eq!(reply.text, "Unsubscribed from 'PD5MI'");
        assert_eq!(store.list(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_yes_is_case_insensitive() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");
        store.add(&id, "UR3AMP").await.unwrap();
        store.add(&ConversationId::new("7"), "PD5MI").await.unwrap();

        let reply = send(&machine, "42", "/reset").await;
        assert_eq!(reply.text, replies::RESET_PROMPT);
        assert_eq!(reply.keyboard, Some(ReplyKeyboard::yes_no()));
        assert_eq!(machine.state(&id), ConversationState::AwaitingResetConfirmation);

        let reply = send(&machine, "42", "YES").await;
        assert_eq!(reply.text, replies::RESET_DONE);
        assert_eq!(reply.keyboard, Some(ReplyKeyboard::Remove));
        assert!(store.list(&id).await.unwrap().is_empty());
        assert_eq!(
            store.list_distinct_subscribers().await.unwrap(),
            BTreeSet::from([ConversationId::new("7")])
        );
    }

    #[tokio::test]
    async fn test_reset_no_falls_through_to_echo() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");
        store.add(&id, "UR3AMP").await.unwrap();

        send(&machine, "42", "/reset").await;
        let reply = send(&machine, "42", "No").await;

        assert_eq!(reply.text, "No");
        assert_eq!(reply.keyboard, Some(ReplyKeyboard::Remove));
        assert_eq!(machine.state(&id), ConversationState::Idle);
        assert_eq!(store.list(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_command_supersedes_pending_prompt() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        let reply = send(&machine, "42", "/info").await;
        assert_eq!(reply.text, "You have <b>0</b> subscriptions:");
        assert_eq!(machine.state(&id), ConversationState::Idle);

        let reply = send(&machine, "42", "ur3amp").await;
        assert_eq!(reply.text, "ur3amp");
        assert!(store.list(&id).await.unwrap().is_empty());

        send(&machine, "42", "/watch").await;
        send(&machine, "42", "/unwatch").await;
        assert_eq!(machine.state(&id), ConversationState::AwaitingUnwatchPattern);
    }

    #[tokio::test]
    async fn test_command_for_another_bot_is_ignored() {
        let store = memory_store().await;
        let machine = machine_over(store.clone(), &ConversationConfig::default())
            .with_bot_username("CallsignWatchBot");
        let id = ConversationId::new("-100");

        let reply = send(&machine, "-100", "/watch@OtherBot").await;
        assert_eq!(reply.text, "/watch@OtherBot");
        assert_eq!(machine.state(&id), ConversationState::Idle);

        let reply = send(&machine, "-100", "/watch@CallsignWatchBot").await;
        assert_eq!(reply.text, replies::WATCH_PROMPT);
        assert_eq!(machine.state(&id), ConversationState::AwaitingWatchPattern);
    }

    #[tokio::test]
    async fn test_unknown_slash_text_is_a_pattern() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        let reply = send(&machine, "42", "/abc").await;

        assert_eq!(reply.text, "Watching for '/ABC'");
        assert!(store.exists(&id, "/ABC").await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_content_while_pending() {
        let (machine, store) = machine().await;
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        let reply = machine
            .handle(&InboundEvent::unsupported("42", "sticker"))
            .await;

        assert_eq!(reply.text, replies::UNSUPPORTED_CONTENT);
        assert_eq!(machine.state(&id), ConversationState::Idle);
        assert!(store.list(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idle_text_is_echoed_escaped() {
        let (machine, _store) = machine().await;
        let reply = send(&machine, "42", "73 <de> UR3AMP").await;
        assert_eq!(reply.text, "73 &lt;de&gt; UR3AMP");
    }

    #[tokio::test]
    async fn test_start_greets_sender() {
        let (machine, _store) = machine().await;
        let reply = machine
            .handle(&InboundEvent::text("42", "/start").with_sender_name("Olena K"))
            .await;
        assert_eq!(reply.text, "Hello, <b>Olena K</b>!");
    }

    #[tokio::test]
    async fn test_conversations_are_independent() {
        let (machine, store) = machine().await;

        send(&machine, "A", "/watch").await;
        let reply = send(&machine, "B", "ur3amp").await;
        assert_eq!(reply.text, "ur3amp");

        send(&machine, "A", "ur3amp").await;
        assert!(store.exists(&ConversationId::new("A"), "UR3AMP").await.unwrap());
        assert!(store.list(&ConversationId::new("B")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_and_idle() {
        let machine = machine_over(Arc::new(FailingStore), &ConversationConfig::default());
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        let reply = send(&machine, "42", "ur3amp").await;
        assert_eq!(reply.text, replies::STORAGE_FAILURE);
        assert_eq!(machine.state(&id), ConversationState::Idle);

        let reply = send(&machine, "42", "/info").await;
        assert_eq!(reply.text, replies::STORAGE_FAILURE);

        send(&machine, "42", "/unwatch").await;
        let reply = send(&machine, "42", "ur3amp").await;
        assert_eq!(reply.text, replies::STORAGE_FAILURE);
        assert_eq!(reply.keyboard, Some(ReplyKeyboard::Remove));
        assert_eq!(machine.state(&id), ConversationState::Idle);

        send(&machine, "42", "/reset").await;
        let reply = send(&machine, "42", "yes").await;
        assert_eq!(reply.text, replies::STORAGE_FAILURE);
        assert_eq!(machine.state(&id), ConversationState::Idle);
        assert_eq!(machine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_prompt_expires() {
        let store = memory_store().await;
        let config = ConversationConfig {
            pending_timeout_seconds: Some(60),
            ..ConversationConfig::default()
        };
        let machine = machine_over(store.clone(), &config);
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(machine.state(&id), ConversationState::Idle);

        let reply = send(&machine, "42", "ur3amp").await;
        assert_eq!(reply.text, "ur3amp");
        assert!(store.list(&id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_prompts_are_dropped_without_new_messages() {
        let store = memory_store().await;
        let config = ConversationConfig {
            pending_timeout_seconds: Some(60),
            ..ConversationConfig::default()
        };
        let machine = machine_over(store, &config);

        send(&machine, "A", "/watch").await;
        send(&machine, "B", "/reset").await;
        assert_eq!(machine.pending_count(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(machine.pending_count(), 0);

        send(&machine, "C", "/unwatch").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(machine.pending_count(), 1);
        assert_eq!(
            machine.state(&ConversationId::new("C")),
            ConversationState::AwaitingUnwatchPattern
        );
    }

    #[tokio::test]
    async fn test_pending_prompt_waits_without_timeout() {
        let (machine, _store) = machine().await;
        let id = ConversationId::new("42");

        send(&machine, "42", "/watch").await;
        assert!(machine.state(&id).is_pending());
    }
}
