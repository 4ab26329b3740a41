//! Reply texts sent by the conversation state machine.
//!
//! Replies are rendered with HTML parse mode, so anything the user typed is
//! escaped before it is echoed back.

use crate::watch::core::subscription::Subscription;

/// Prompt after `/watch`.
pub const WATCH_PROMPT: &str = "Enter the callsign";
/// Prompt after `/unwatch`.
pub const UNWATCH_PROMPT: &str = "Enter the filter (callsign) to unsubscribe";
/// Confirmation question after `/reset`.
pub const RESET_PROMPT: &str = "Do you want to remove all subscriptions?";
/// Reply after a successful reset.
pub const RESET_DONE: &str = "You unsubscribed successfully from all notifications.";
/// Guidance when a pattern fails validation.
pub const INVALID_FILTER: &str = "Filter is invalid. Please enter valid callsign.";
/// Fallback when a message has nothing to echo.
pub const UNSUPPORTED_CONTENT: &str = "Nice try!";
/// Reply when the store could not complete a request.
pub const STORAGE_FAILURE: &str = "Something went wrong on our side. Please try again later.";

const INFO_INDENT: &str = "    ";

/// Escape text for Telegram HTML parse mode.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Greeting for `/start`.
#[must_use]
pub fn greeting(sender_name: Option<&str>) -> String {
    match sender_name {
        Some(name) if !name.trim().is_empty() => format!("Hello, <b>{}</b>!", escape_html(name)),
        _ => "Hello!".to_string(),
    }
}

/// Subscription summary for `/info`.
#[must_use]
pub fn subscription_list(subscriptions: &[Subscription]) -> String {
    let mut out = format!("You have <b>{}</b> subscriptions:", subscriptions.len());
    for subscription in subscriptions {
        out.push('\n');
        out.push_str(INFO_INDENT);
        out.push_str(&escape_html(&subscription.pattern));
    }
    out
}

/// Confirmation after a pattern was stored.
#[must_use]
pub fn watching(pattern: &str) -> String {
    format!("Watching for '{}'", escape_html(pattern))
}

/// Confirmation after a pattern was removed.
#[must_use]
pub fn unsubscribed(pattern: &str) -> String {
    format!("Unsubscribed from '{}'", escape_html(pattern))
}
