//! Subscription record model.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::watch::core::errors::{WatchError, WatchResult};
use crate::watch::core::ids::ConversationId;

/// Format `SQLite` uses for `CURRENT_TIMESTAMP`.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A stored callsign watch for one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Conversation that receives notifications.
    pub conversation_id: ConversationId,
    /// Callsign filter the conversation watches.
    pub pattern: String,
    /// Insertion time, assigned by the store.
    pub created_at: DateTime<Utc>,
}

/// Parse a `created_at` column value written by `SQLite`.
///
/// # Errors
/// Returns `InvalidRecord` if the text is not an `SQLite` UTC timestamp.
pub fn parse_sqlite_timestamp(raw: &str) -> WatchResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| WatchError::InvalidRecord(format!("invalid created_at '{raw}': {err}")))
}
