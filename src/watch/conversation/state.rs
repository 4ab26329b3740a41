//! Per-conversation state.

use std::fmt;

/// What the machine expects from the next message of a conversation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ConversationState {
    /// No multi-step command in flight.
    #[default]
    Idle,
    /// `/watch` was sent; the next text is the pattern to add.
    AwaitingWatchPattern,
    /// `/unwatch` was sent; the next text is the pattern to remove.
    AwaitingUnwatchPattern,
    /// `/reset` was sent; the next text confirms with "yes".
    AwaitingResetConfirmation,
}

impl ConversationState {
    /// Stable name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingWatchPattern => "awaiting_watch_pattern",
            Self::AwaitingUnwatchPattern => "awaiting_unwatch_pattern",
            Self::AwaitingResetConfirmation => "awaiting_reset_confirmation",
        }
    }

    /// Whether the conversation is waiting for an answer.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
