//! Subscriber broadcast.

pub mod broadcaster;

pub use broadcaster::{BroadcastReport, Broadcaster};
