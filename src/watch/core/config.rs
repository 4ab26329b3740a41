//! Configuration for the watch bot.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::watch::core::errors::{WatchError, WatchResult};

/// Bot API credential.
pub const ENV_BOT_API_KEY: &str = "BOT_API_KEY";
/// `SQLite` database path (`:memory:` is accepted).
pub const ENV_DB_CONNECTION_STRING: &str = "DB_CONNECTION_STRING";
/// Subscription table name override.
pub const ENV_SUBSCRIPTION_TABLE: &str = "WATCH_SUBSCRIPTION_TABLE";
/// Bot API base URL override.
pub const ENV_API_BASE_URL: &str = "WATCH_API_BASE_URL";
/// Long-poll timeout in seconds.
pub const ENV_POLL_TIMEOUT_SECONDS: &str = "WATCH_POLL_TIMEOUT_SECONDS";
/// Pending prompt timeout in seconds.
pub const ENV_PENDING_TIMEOUT_SECONDS: &str = "WATCH_PENDING_TIMEOUT_SECONDS";
/// Idle time before a conversation worker retires.
pub const ENV_WORKER_IDLE_SECONDS: &str = "WATCH_WORKER_IDLE_SECONDS";
/// Whether to greet every subscriber at startup.
pub const ENV_BROADCAST_ON_STARTUP: &str = "WATCH_BROADCAST_ON_STARTUP";
/// Startup greeting text.
pub const ENV_BROADCAST_MESSAGE: &str = "WATCH_BROADCAST_MESSAGE";

/// Top-level configuration for the bot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Persistence settings.
    pub storage: StorageConfig,
    /// Bot API settings.
    pub telegram: TelegramConfig,
    /// Conversation handling settings.
    pub conversation: ConversationConfig,
    /// Startup broadcast settings.
    pub broadcast: BroadcastConfig,
}

impl BotConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is missing, malformed, or the result is invalid.
    pub fn from_env() -> WatchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a variable is missing, malformed, or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> WatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.telegram.token = lookup(ENV_BOT_API_KEY).unwrap_or_default();
        if let Some(path) = lookup(ENV_DB_CONNECTION_STRING) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(table) = lookup(ENV_SUBSCRIPTION_TABLE) {
            config.storage.subscription_table = table;
        }
        if let Some(base_url) = lookup(ENV_API_BASE_URL) {
            config.telegram.api_base_url = base_url;
        }
        if let Some(timeout) = parse_var(&lookup, ENV_POLL_TIMEOUT_SECONDS)? {
            config.telegram.poll_timeout_seconds = timeout;
        }
        if let Some(timeout) = parse_var(&lookup, ENV_PENDING_TIMEOUT_SECONDS)? {
            config.conversation.pending_timeout_seconds = Some(timeout);
        }
        if let Some(idle) = parse_var(&lookup, ENV_WORKER_IDLE_SECONDS)? {
            config.conversation.worker_idle_seconds = idle;
        }
        if let Some(enabled) = parse_var(&lookup, ENV_BROADCAST_ON_STARTUP)? {
            config.broadcast.on_startup = enabled;
        }
        if let Some(message) = lookup(ENV_BROADCAST_MESSAGE) {
            config.broadcast.message = message;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> WatchResult<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(WatchError::InvalidConfig(format!(
                "{ENV_BOT_API_KEY} must be set"
            )));
        }

        if self.telegram.poll_timeout_seconds == 0 {
            return Err(WatchError::InvalidConfig(
                "telegram.poll_timeout_seconds must be > 0".to_string(),
            ));
        }

        Url::parse(&self.telegram.api_base_url)?;

        if !is_sql_identifier(&self.storage.subscription_table) {
            return Err(WatchError::InvalidConfig(format!(
                "storage.subscription_table '{}' is not a plain identifier",
                self.storage.subscription_table
            )));
        }

        if self.storage.sqlite_path.as_os_str().is_empty() {
            return Err(WatchError::InvalidConfig(
                "storage.sqlite_path must not be empty".to_string(),
            ));
        }

        if self.conversation.pending_timeout_seconds == Some(0) {
            return Err(WatchError::InvalidConfig(
                "conversation.pending_timeout_seconds must be > 0 when set".to_string(),
            ));
        }

        if self.conversation.worker_idle_seconds == 0 {
            return Err(WatchError::InvalidConfig(
                "conversation.worker_idle_seconds must be > 0".to_string(),
            ));
        }

        if self.broadcast.concurrency == 0 {
            return Err(WatchError::InvalidConfig(
                "broadcast.concurrency must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> WatchResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| WatchError::InvalidConfig(format!("{key}='{raw}': {err}")))
        })
        .transpose()
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Storage configuration for subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Subscription table name.
    pub subscription_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("subscriptions.sqlite"),
            subscription_table: "subscription".to_string(),
        }
    }
}

/// Bot API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot access token.
    #[serde(skip_serializing)]
    pub token: String,
    /// Bot API base URL.
    pub api_base_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_seconds: u64,
    /// Delay before polling again after a failure.
    pub retry_delay_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base_url: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
            retry_delay_seconds: 5,
        }
    }
}

/// Conversation handling settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Age after which a pending prompt is treated as abandoned.
    pub pending_timeout_seconds: Option<u64>,
    /// Idle time before a per-conversation worker retires.
    pub worker_idle_seconds: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            pending_timeout_seconds: None,
            worker_idle_seconds: 300,
        }
    }
}

/// Startup broadcast settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Greet every subscriber when the bot starts.
    pub on_startup: bool,
    /// Greeting text.
    pub message: String,
    /// Maximum in-flight deliveries.
    pub concurrency: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            on_startup: true,
            message: "Hi!".to_string(),
            concurrency: 8,
        }
    }
}
