//! Persistent storage for subscriptions.

pub mod subscription_store;

pub use subscription_store::{SqliteSubscriptionStore, StoreFuture, SubscriptionStore};
