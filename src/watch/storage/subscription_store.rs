//! Subscription store: durable mapping of conversation identity to watched patterns.
//!
//! Every mutating call is a single autocommitted statement, so once a call
//! returns `Ok` its effect is durable.
//!
//! The pair lookups (`exists`, `remove`) use SQL `LIKE`, which makes `%` and
//! `_` wildcards and ASCII letters case-insensitive; stored patterns never
//! contain either wildcard. Identity-only lookups (`list`, `remove_all`)
//! compare exactly. Column names (`chat_id`, `callsign`, `created`) match
//! databases written by earlier deployments of the bot.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use tokio_rusqlite::Connection;
use tracing::debug;

use crate::watch::core::config::StorageConfig;
use crate::watch::core::errors::WatchResult;
use crate::watch::core::ids::ConversationId;
use crate::watch::core::subscription::{Subscription, parse_sqlite_timestamp};

/// Boxed future type for subscription store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Subscription store trait.
pub trait SubscriptionStore: Send + Sync {
    /// Insert a subscription. Duplicates are not checked.
    ///
    /// # Errors
    /// Returns an error if the write cannot be committed.
    fn add(&self, conversation_id: &ConversationId, pattern: &str)
    -> StoreFuture<'_, WatchResult<()>>;

    /// Whether at least one row matches both fields.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn exists(
        &self,
        conversation_id: &ConversationId,
        pattern: &str,
    ) -> StoreFuture<'_, WatchResult<bool>>;

    /// All subscriptions of a conversation in insertion order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list(&self, conversation_id: &ConversationId)
    -> StoreFuture<'_, WatchResult<Vec<Subscription>>>;

    /// Delete every row matching both fields. Matching nothing is not an error.
    ///
    /// # Errors
    /// Returns an error if the delete cannot be committed.
    fn remove(
        &self,
        conversation_id: &ConversationId,
        pattern: &str,
    ) -> StoreFuture<'_, WatchResult<()>>;

    /// Delete every row of a conversation.
    ///
    /// # Errors
    /// Returns an error if the delete cannot be committed.
    fn remove_all(&self, conversation_id: &ConversationId) -> StoreFuture<'_, WatchResult<()>>;

    /// Every conversation with at least one subscription.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_distinct_subscribers(&self) -> StoreFuture<'_, WatchResult<BTreeSet<ConversationId>>>;
}

/// `SQLite` implementation of the subscription store.
pub struct SqliteSubscriptionStore {
    conn: Connection,
    table: String,
}

impl SqliteSubscriptionStore {
    /// Open the database and create the subscription table if needed.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> WatchResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        let table = config.subscription_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    chat_id VARCHAR(255),
                    callsign VARCHAR(255),
                    created DATETIME DEFAULT CURRENT_TIMESTAMP
                )"
            ))?;
            Ok(())
        })
        .await?;

        debug!(path = %config.sqlite_path.display(), table = %table, "Opened subscription store");

        Ok(Self { conn, table })
    }
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn add(
        &self,
        conversation_id: &ConversationId,
        pattern: &str,
    ) -> StoreFuture<'_, WatchResult<()>> {
        let conversation = conversation_id.to_string();
        let pattern = pattern.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!("INSERT INTO {table} (chat_id, callsign) VALUES (?1, ?2)"),
                        rusqlite::params![conversation, pattern],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn exists(
        &self,
        conversation_id: &ConversationId,
        pattern: &str,
    ) -> StoreFuture<'_, WatchResult<bool>> {
        let conversation = conversation_id.to_string();
        let pattern = pattern.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let count = self
                .conn
                .call(move |conn| {
                    let count: i64 = conn.query_row(
                        &format!(
                            "SELECT COUNT(*) FROM {table}
                             WHERE chat_id LIKE ?1 AND callsign LIKE ?2"
                        ),
                        rusqlite::params![conversation, pattern],
                        |row| row.get(0),
                    )?;
                    Ok(count)
                })
                .await?;
            Ok(count > 0)
        })
    }

    fn list(
        &self,
        conversation_id: &ConversationId,
    ) -> StoreFuture<'_, WatchResult<Vec<Subscription>>> {
        let conversation = conversation_id.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT chat_id, callsign, created
                         FROM {table}
                         WHERE chat_id = ?1
                         ORDER BY rowid"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![conversation], |row| {
                            let conversation_id: String = row.get(0)?;
                            let pattern: String = row.get(1)?;
                            let created_at: String = row.get(2)?;
                            Ok((conversation_id, pattern, created_at))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut subscriptions = Vec::with_capacity(rows.len());
            for (conversation_id, pattern, created_at) in rows {
                subscriptions.push(Subscription {
                    conversation_id: ConversationId::from(conversation_id),
                    pattern,
                    created_at: parse_sqlite_timestamp(&created_at)?,
                });
            }

            Ok(subscriptions)
        })
    }

    fn remove(
        &self,
        conversation_id: &ConversationId,
        pattern: &str,
    ) -> StoreFuture<'_, WatchResult<()>> {
        let conversation = conversation_id.to_string();
        let pattern = pattern.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let deleted = self
                .conn
                .call(move |conn| {
                    let deleted = conn.execute(
                        &format!(
                            "DELETE FROM {table} WHERE chat_id LIKE ?1 AND callsign LIKE ?2"
                        ),
                        rusqlite::params![conversation, pattern],
                    )?;
                    Ok(deleted)
                })
                .await?;
            debug!(deleted, "Removed matching subscriptions");
            Ok(())
        })
    }

    fn remove_all(&self, conversation_id: &ConversationId) -> StoreFuture<'_, WatchResult<()>> {
        let conversation = conversation_id.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let deleted = self
                .conn
                .call(move |conn| {
                    let deleted = conn.execute(
                        &format!("DELETE FROM {table} WHERE chat_id = ?1"),
                        rusqlite::params![conversation],
                    )?;
                    Ok(deleted)
                })
                .await?;
            debug!(deleted, "Removed all subscriptions of a conversation");
            Ok(())
        })
    }

    fn list_distinct_subscribers(&self) -> StoreFuture<'_, WatchResult<BTreeSet<ConversationId>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt =
                        conn.prepare(&format!("SELECT DISTINCT chat_id FROM {table}"))?;
                    let rows = stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            Ok(rows.into_iter().map(ConversationId::from).collect())
        })
    }
}
