//! Channel-agnostic inbound and outbound message shapes.

use serde::{Deserialize, Serialize};

use crate::watch::conversation::command::Command;
use crate::watch::core::ids::ConversationId;

/// Declared content of an inbound message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MessageContent {
    /// Plain text that can be shown back to the user.
    Text {
        /// Message text.
        text: String,
    },
    /// Media or service content with no displayable text.
    Unsupported {
        /// Content kind reported by the transport (e.g. `photo`).
        kind: String,
    },
}

/// A message received from a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Conversation the message came from.
    pub conversation_id: ConversationId,
    /// Transport message id, used to thread replies.
    pub message_id: Option<i64>,
    /// Display name of the sender, if known.
    pub sender_name: Option<String>,
    /// Message content.
    pub content: MessageContent,
}

impl InboundEvent {
    /// Build a text event.
    #[must_use]
    pub fn text(conversation_id: impl Into<ConversationId>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: None,
            sender_name: None,
            content: MessageContent::Text { text: text.into() },
        }
    }

    /// Build an event carrying non-text content.
    #[must_use]
    pub fn unsupported(conversation_id: impl Into<ConversationId>, kind: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: None,
            sender_name: None,
            content: MessageContent::Unsupported { kind: kind.into() },
        }
    }

    /// Attach the transport message id.
    #[must_use]
    pub const fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Attach the sender display name.
    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Displayable text, if any.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text.as_str()),
            MessageContent::Unsupported { .. } => None,
        }
    }

    /// Recognised command, if the text starts with one.
    #[must_use]
    pub fn command(&self) -> Option<Command> {
        self.text_content().and_then(Command::parse)
    }

    /// Recognised command addressed to `bot_username` (or to no bot in particular).
    #[must_use]
    pub fn command_for(&self, bot_username: Option<&str>) -> Option<Command> {
        self.text_content()
            .and_then(|text| Command::parse_addressed(text, bot_username))
    }
}

/// Reply affordance attached to an outbound message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKeyboard {
    /// Show a custom keyboard with these button rows.
    Buttons(Vec<Vec<String>>),
    /// Hide any custom keyboard currently shown.
    Remove,
}

impl ReplyKeyboard {
    /// A single `Yes` / `No` row.
    #[must_use]
    pub fn yes_no() -> Self {
        Self::Buttons(vec![vec!["Yes".to_string(), "No".to_string()]])
    }
}

/// A message to deliver to a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination conversation.
    pub conversation_id: ConversationId,
    /// Message text (HTML markup allowed).
    pub text: String,
    /// Optional reply affordance.
    pub keyboard: Option<ReplyKeyboard>,
    /// Message this one answers, if any.
    pub reply_to_message_id: Option<i64>,
}

impl OutboundMessage {
    /// Build a plain message.
    #[must_use]
    pub fn new(conversation_id: impl Into<ConversationId>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            keyboard: None,
            reply_to_message_id: None,
        }
    }

    /// Attach a reply affordance.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Thread the message as a reply.
    #[must_use]
    pub const fn in_reply_to(mut self, message_id: Option<i64>) -> Self {
        self.reply_to_message_id = message_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_event_command() {
        let event = InboundEvent::text("42", "/watch");
        assert_eq!(event.command(), Some(Command::Watch));
        assert_eq!(event.text_content(), Some("/watch"));
    }

    #[test]
    fn test_unsupported_event_has_no_text() {
        let event = InboundEvent::unsupported("42", "sticker");
        assert_eq!(event.text_content(), None);
        assert_eq!(event.command(), None);
    }

    #[test]
    fn test_command_for_other_bot_is_text() {
        let event = InboundEvent::text("-100", "/watch@OtherBot");
        assert_eq!(event.command(), Some(Command::Watch));
        assert_eq!(event.command_for(Some("CallsignWatchBot")), None);
        assert_eq!(event.text_content(), Some("/watch@OtherBot"));
    }

    #[test]
    fn test_outbound_builders() {
        let msg = OutboundMessage::new("42", "Do you want to remove all subscriptions?")
            .with_keyboard(ReplyKeyboard::yes_no())
            .in_reply_to(Some(7));
        assert_eq!(msg.reply_to_message_id, Some(7));
        assert_eq!(
            msg.keyboard,
            Some(ReplyKeyboard::Buttons(vec![vec![
                "Yes".to_string(),
                "No".to_string()
            ]]))
        );
    }
}
