//! Telegram Bot API transport (long polling + `sendMessage`).

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{InboundEvent, MessageContent, OutboundMessage, ReplyKeyboard};
use super::{Transport, TransportFuture};
use crate::watch::core::config::TelegramConfig;
use crate::watch::core::errors::{WatchError, WatchResult};
use crate::watch::core::ids::ConversationId;

/// Extra time granted to the HTTP client beyond the long-poll timeout.
const HTTP_TIMEOUT_MARGIN_SECONDS: u64 = 10;

/// Message fields that identify non-text content, checked in order.
const CONTENT_KINDS: &[&str] = &[
    "photo",
    "sticker",
    "animation",
    "video",
    "video_note",
    "voice",
    "audio",
    "document",
    "location",
    "venue",
    "contact",
    "poll",
    "dice",
];

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// One entry returned by `getUpdates`.
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    /// Monotonic update id used as polling offset.
    pub update_id: i64,
    /// New incoming message, if this update carries one.
    pub message: Option<TelegramMessage>,
}

/// Subset of a Bot API `Message`.
#[derive(Clone, Debug, Deserialize)]
pub struct TelegramMessage {
    /// Message id within the chat.
    pub message_id: i64,
    /// Chat the message belongs to.
    pub chat: TelegramChat,
    /// Sender, empty for channel posts.
    pub from: Option<TelegramUser>,
    /// Text for text messages.
    pub text: Option<String>,
    /// Remaining fields, used to name non-text content.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Subset of a Bot API `Chat`.
#[derive(Clone, Debug, Deserialize)]
pub struct TelegramChat {
    /// Chat id.
    pub id: i64,
}

/// Subset of a Bot API `User`.
#[derive(Clone, Debug, Deserialize)]
pub struct TelegramUser {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: Option<String>,
    /// Username without the leading `@`.
    pub username: Option<String>,
}

impl TelegramUser {
    /// First and last name joined by a space.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

impl Update {
    /// Convert into a transport-neutral event. Updates without a message yield `None`.
    #[must_use]
    pub fn into_event(self) -> Option<InboundEvent> {
        let message = self.message?;
        let content = match message.text {
            Some(text) => MessageContent::Text { text },
            None => {
                let kind = CONTENT_KINDS
                    .iter()
                    .find(|kind| message.extra.contains_key(**kind))
                    .map_or("unknown", |kind| *kind);
                MessageContent::Unsupported {
                    kind: kind.to_string(),
                }
            }
        };

        Some(InboundEvent {
            conversation_id: ConversationId::from(message.chat.id),
            message_id: Some(message.message_id),
            sender_name: message.from.as_ref().map(TelegramUser::full_name),
            content,
        })
    }
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct KeyboardButton {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
}

impl From<&ReplyKeyboard> for ReplyMarkup {
    fn from(keyboard: &ReplyKeyboard) -> Self {
        match keyboard {
            ReplyKeyboard::Buttons(rows) => Self::Keyboard {
                keyboard: rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|text| KeyboardButton { text: text.clone() })
                            .collect()
                    })
                    .collect(),
                resize_keyboard: true,
            },
            ReplyKeyboard::Remove => Self::Remove {
                remove_keyboard: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ReplyParameters {
    message_id: i64,
    allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

impl<'a> SendMessageRequest<'a> {
    fn from_message(message: &'a OutboundMessage) -> Self {
        Self {
            chat_id: message.conversation_id.as_str(),
            text: &message.text,
            parse_mode: "HTML",
            reply_markup: message.keyboard.as_ref().map(ReplyMarkup::from),
            reply_parameters: message.reply_to_message_id.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
        }
    }
}

/// Telegram Bot API client.
pub struct TelegramTransport {
    client: Client,
    endpoint: String,
    poll_timeout_seconds: u64,
}

impl TelegramTransport {
    /// Build a client for the configured bot.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &TelegramConfig) -> WatchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_seconds + HTTP_TIMEOUT_MARGIN_SECONDS,
            ))
            .build()
            .map_err(redact)?;
        let endpoint = format!(
            "{}/bot{}",
            config.api_base_url.trim_end_matches('/'),
            config.token
        );

        Ok(Self {
            client,
            endpoint,
            poll_timeout_seconds: config.poll_timeout_seconds,
        })
    }

    /// Long-poll for new updates after `offset`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    pub async fn get_updates(&self, offset: Option<i64>) -> WatchResult<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_seconds,
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &request).await
    }

    /// Fetch the bot's own account.
    ///
    /// # Errors
    /// Returns an error if the request fails or the token is rejected.
    pub async fn get_me(&self) -> WatchResult<TelegramUser> {
        self.call("getMe", &serde_json::Map::new()).await
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> WatchResult<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response: ApiResponse<R> = self
            .client
            .post(format!("{}/{method}", self.endpoint))
            .json(payload)
            .send()
            .await
            .map_err(redact)?
            .json()
            .await
            .map_err(redact)?;

        if !response.ok {
            return Err(WatchError::Telegram {
                method: method.to_string(),
                description: response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        response.result.ok_or_else(|| WatchError::Telegram {
            method: method.to_string(),
            description: "response carried no result".to_string(),
        })
    }
}

impl Transport for TelegramTransport {
    fn send(&self, message: OutboundMessage) -> TransportFuture<'_, WatchResult<()>> {
        Box::pin(async move {
            let request = SendMessageRequest::from_message(&message);
            let _sent: serde_json::Value = self.call("sendMessage", &request).await?;
            debug!(conversation_id = %message.conversation_id, "Delivered message");
            Ok(())
        })
    }
}

/// Strip the request URL, which embeds the bot token.
fn redact(err: reqwest::Error) -> WatchError {
    WatchError::Http(err.without_url())
}
