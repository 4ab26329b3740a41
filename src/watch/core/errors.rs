//! Error types for the watch bot.

use thiserror::Error;

/// Watch bot error type.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Callsign filter rejected by the validator.
    #[error("invalid callsign filter: {0}")]
    InvalidFilter(String),
    /// `SQLite` storage error, raised on the connection thread.
    #[error("sqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// A stored row could not be decoded.
    #[error("invalid subscription record: {0}")]
    InvalidRecord(String),
    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The Bot API answered with `ok: false`.
    #[error("telegram {method} failed: {description}")]
    Telegram {
        /// Bot API method that was called.
        method: String,
        /// Description returned by the API.
        description: String,
    },
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl WatchError {
    /// Whether the error came from the persistence backend.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::TokioSqlite(_) | Self::InvalidRecord(_)
        )
    }

    /// Whether the error came from delivering a message to the transport.
    #[must_use]
    pub const fn is_delivery(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Telegram { .. })
    }

    /// Short error class for structured log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        if self.is_storage() {
            "storage"
        } else if self.is_delivery() {
            "delivery"
        } else {
            match self {
                Self::InvalidFilter(_) => "validation",
                _ => "config",
            }
        }
    }
}

/// Convenience result alias for watch bot operations.
pub type WatchResult<T> = Result<T, WatchError>;
