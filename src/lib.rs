//! Telegram bot that lets chats subscribe to amateur radio callsign filters.

// Hard bans
#![deny(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(unused_must_use)] // Results must be handled
#![deny(nonstandard_style)]
#![deny(overflowing_literals)]
#![warn(warnings)]
#![warn(missing_docs)]
#![warn(dead_code)]
#![warn(unused_imports)]
#![warn(unused_variables)]

// Clippy
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::too_many_arguments)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

/// Update polling and per-conversation dispatch.
pub mod bot;
/// Entry helpers to start the bot.
pub mod start_callsign_watch;
/// Chat transport boundary and the Telegram Bot API client.
pub mod transport;
/// Subscriptions, filter validation, conversations, and broadcast.
pub mod watch;
