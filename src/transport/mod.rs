//! Chat transport boundary.
//!
//! The conversation core and the broadcaster only ever call [`Transport::send`];
//! receiving is driven by the bot runner, which turns transport updates into
//! [`InboundEvent`]s.

pub mod telegram;
pub mod types;

use std::future::Future;
use std::pin::Pin;

pub use telegram::{TelegramTransport, Update};
pub use types::{InboundEvent, MessageContent, OutboundMessage, ReplyKeyboard};

use crate::watch::core::errors::WatchResult;

/// Boxed future type for transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound side of a chat transport.
pub trait Transport: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    /// Returns a delivery error if the transport rejects or cannot reach the recipient.
    fn send(&self, message: OutboundMessage) -> TransportFuture<'_, WatchResult<()>>;
}
