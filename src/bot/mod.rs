//! Bot runtime: update polling and ordered per-conversation dispatch.

pub mod dispatcher;
pub mod runner;

pub use dispatcher::Dispatcher;
pub use runner::BotRunner;
