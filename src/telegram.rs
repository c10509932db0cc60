//! Chat client speaking the Telegram bot API: long-polled command events in,
//! notifications and login prompts out.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, CHAT_LONGPOLL_SECS};
use crate::engine::ChatGateway;
use crate::error::{AppError, Result};
use crate::types::ChatEvent;

pub struct Telegram {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Telegram {
    pub fn new(cfg: &Config) -> Result<Self> {
        // The client must outlive the server-side long-poll wait.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHAT_LONGPOLL_SECS + 30))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.telegram_api_url.clone(),
            token: cfg.telegram_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn send_message(&self, req: &SendMessageRequest<'_>) -> Result<()> {
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Api(format!(
                "sendMessage returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for Telegram {
    async fn events_after(&self, after_id: i64) -> Result<Vec<ChatEvent>> {
        let timeout = CHAT_LONGPOLL_SECS.to_string();
        // getUpdates offset semantics: the first update id we want back.
        let offset = (after_id + 1).to_string();

        let resp = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[("timeout", timeout.as_str()), ("offset", offset.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AppError::Api(format!(
                "getUpdates returned {status}: {body}"
            )));
        }

        let updates: UpdatesResponse = serde_json::from_str(&body)?;
        if !updates.ok {
            return Err(AppError::Api("getUpdates returned ok=false".to_string()));
        }

        Ok(updates.result.into_iter().filter_map(to_chat_event).collect())
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(&SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
            reply_markup: None,
        })
        .await
    }

    async fn send_login_prompt(&self, chat_id: i64, text: &str, login_url: &str) -> Result<()> {
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Log in to your shop",
                url: login_url,
            }]],
        };
        self.send_message(&SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
            reply_markup: Some(keyboard),
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Vec<TgUpdate>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    from: Option<TgUser>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    entities: Vec<TgEntity>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgEntity {
    #[serde(rename = "type")]
    kind: String,
}

/// Reduce a raw update to a ChatEvent. Updates without a message body (edits,
/// channel posts, ...) are skipped; the poll offset still advances past them
/// because the id comes from the update, not the message.
fn to_chat_event(update: TgUpdate) -> Option<ChatEvent> {
    let message = update.message?;
    let from = message.from?;

    let command = match message.entities.first() {
        Some(entity) if entity.kind == "bot_command" => message
            .text
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string(),
        _ => String::new(),
    };

    Some(ChatEvent {
        message_id: update.update_id,
        chat_id: message.chat.id,
        chat_user_id: from.id,
        command,
        text: message.text,
    })
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    url: &'a str,
}
