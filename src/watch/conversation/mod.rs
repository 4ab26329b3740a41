//! Conversation handling: commands, states, replies, and the state machine.

pub mod command;
pub mod machine;
pub mod replies;
pub mod state;

pub use command::Command;
pub use machine::ConversationStateMachine;
pub use state::ConversationState;
