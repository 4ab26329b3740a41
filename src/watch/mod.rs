//! Callsign watch subsystem.
//!
//! Organized into:
//! - `core`: configuration, errors, identifiers, and the subscription record
//! - `filter`: callsign filter validation
//! - `storage`: durable subscription store with a `SQLite` backend
//! - `conversation`: commands, per-conversation state, and the state machine
//! - `broadcast`: best-effort delivery to every subscriber

pub mod broadcast;
pub mod conversation;
pub mod core;
pub mod filter;
pub mod storage;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use conversation::{Command, ConversationState, ConversationStateMachine};
pub use core::{
    BotConfig, BroadcastConfig, ConversationConfig, ConversationId, StorageConfig, Subscription,
    TelegramConfig, WatchError, WatchResult,
};
pub use filter::FilterValidator;
pub use storage::{SqliteSubscriptionStore, SubscriptionStore};
