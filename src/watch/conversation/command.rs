//! Bot commands understood by the conversation state machine.

use std::fmt;
use std::str::FromStr;

/// A recognised slash command.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    /// `/start`: greet the user.
    Start,
    /// `/info`: list subscriptions.
    Info,
    /// `/watch`: add a subscription (next message is the pattern).
    Watch,
    /// `/unwatch`: remove a subscription (next message is the pattern).
    Unwatch,
    /// `/reset`: remove every subscription after confirmation.
    Reset,
}

impl Command {
    /// Stable command name without the slash.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Info => "info",
            Self::Watch => "watch",
            Self::Unwatch => "unwatch",
            Self::Reset => "reset",
        }
    }

    /// Recognise a command at the start of a message.
    ///
    /// Only the first whitespace-separated token is considered. Any
    /// `@botname` suffix is accepted; use [`Command::parse_addressed`] when
    /// the bot's own username is known. Unknown slash words are plain text.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::parse_addressed(text, None)
    }

    /// Like [`Command::parse`], but a `@botname` suffix must name `bot_username`.
    ///
    /// Telegram usernames compare ASCII case-insensitively. Commands addressed
    /// to another bot are plain text.
    #[must_use]
    pub fn parse_addressed(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = match (name.split_once('@'), bot_username) {
            (None, _) => name,
            (Some((name, _)), None) => name,
            (Some((name, addressee)), Some(own)) if addressee.eq_ignore_ascii_case(own) => name,
            (Some(_), Some(_)) => return None,
        };
        name.parse().ok()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "start" => Ok(Self::Start),
            "info" => Ok(Self::Info),
            "watch" => Ok(Self::Watch),
            "unwatch" => Ok(Self::Unwatch),
            "reset" => Ok(Self::Reset),
            _ => Err(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/info"), Some(Command::Info));
        assert_eq!(Command::parse("/watch"), Some(Command::Watch));
        assert_eq!(Command::parse("/unwatch"), Some(Command::Unwatch));
        assert_eq!(Command::parse("/reset"), Some(Command::Reset));
    }

    #[test]
    fn test_parse_with_bot_suffix_and_arguments() {
        assert_eq!(Command::parse("/watch@CallsignWatchBot"), Some(Command::Watch));
        assert_eq!(Command::parse("/start deep-link"), Some(Command::Start));
        assert_eq!(Command::parse("  /info  "), Some(Command::Info));
    }

    #[test]
    fn test_suffix_must_name_this_bot() {
        let own = Some("CallsignWatchBot");
        assert_eq!(
            Command::parse_addressed("/watch@CallsignWatchBot", own),
            Some(Command::Watch)
        );
        assert_eq!(
            Command::parse_addressed("/watch@callsignwatchbot", own),
            Some(Command::Watch)
        );
        assert_eq!(Command::parse_addressed("/watch@OtherBot", own), None);
        assert_eq!(Command::parse_addressed("/reset", own), Some(Command::Reset));
        assert_eq!(
            Command::parse_addressed("/reset@OtherBot", None),
            Some(Command::Reset)
        );
    }

    #[test]
    fn test_unknown_or_plain_text() {
        assert_eq!(Command::parse("watch"), None);
        assert_eq!(Command::parse("/abc"), None);
        assert_eq!(Command::parse("/WATCH"), None);
        assert_eq!(Command::parse("ur3amp /watch"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("/"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::Unwatch.to_string(), "/unwatch");
    }
}
