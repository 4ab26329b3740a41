//! Core watch bot types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod subscription;

pub use config::{
    BotConfig, BroadcastConfig, ConversationConfig, StorageConfig, TelegramConfig,
};
pub use errors::{WatchError, WatchResult};
pub use ids::ConversationId;
pub use subscription::Subscription;
