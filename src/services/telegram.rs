//! Telegram Bot API seam
//!
//! Moderation code talks to Telegram through the [`BotApi`] trait. The
//! production implementation wraps `teloxide::Bot`, classifies every
//! failure into a [`BotApiError`] and retries rate-limited and network
//! failures.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::payloads::{
    BanChatMemberSetters, EditMessageTextSetters, RestrictChatMemberSetters, SendMessageSetters,
    UnbanChatMemberSetters,
};
use teloxide::prelude::*;
use teloxide::sugar::request::RequestLinkPreviewExt;
use teloxide::types::{
    ChatMemberKind, ChatPermissions, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
    ParseMode, Recipient, ReplyParameters,
};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use crate::models::broadcast::{ButtonKind, Keyboard};
use crate::utils::errors::{ApiResult, BotApiError};

/// Attempts for network failures before giving up
const NETWORK_RETRIES: u32 = 3;
/// Linear backoff step between network retries
const NETWORK_BACKOFF: Duration = Duration::from_millis(500);
/// Upper bound on how long a single retry-after is honoured
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Options of an outgoing message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub html: bool,
    pub keyboard: Option<Keyboard>,
    pub reply_to: Option<i32>,
    pub disable_preview: bool,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            html: true,
            ..Self::default()
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn without_preview(mut self) -> Self {
        self.disable_preview = true;
        self
    }
}

/// Membership of a user in a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    pub fn is_admin(&self) -> bool {
        matches!(self, MemberStatus::Owner | MemberStatus::Administrator)
    }

    /// Still in the chat, possibly restricted
    pub fn is_present(&self) -> bool {
        !matches!(self, MemberStatus::Left | MemberStatus::Banned)
    }
}

impl From<&ChatMemberKind> for MemberStatus {
    fn from(kind: &ChatMemberKind) -> Self {
        if kind.is_owner() {
            MemberStatus::Owner
        } else if kind.is_administrator() {
            MemberStatus::Administrator
        } else if kind.is_restricted() {
            MemberStatus::Restricted
        } else if kind.is_left() {
            MemberStatus::Left
        } else if kind.is_banned() {
            MemberStatus::Banned
        } else {
            MemberStatus::Member
        }
    }
}

/// Profile fields the checker looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
}

/// Public details of a chat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// The bot's own account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}

/// Bot API operations used by the moderation pipeline
#[async_trait]
pub trait BotApi: Send + Sync + std::fmt::Debug {
    /// Send a text message, returning its message ID
    async fn send_message(&self, chat_id: i64, text: &str, options: SendOptions) -> ApiResult<i32>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        options: SendOptions,
    ) -> ApiResult<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> ApiResult<()>;

    /// Remove every permission; `None` restricts forever
    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()>;

    /// Give back the default member permissions
    async fn lift_restrictions(&self, chat_id: i64, user_id: i64) -> ApiResult<()>;

    /// Ban a user; `None` bans forever
    async fn ban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()>;

    async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> ApiResult<()>;

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> ApiResult<MemberStatus>;

    /// Profile of a user, including the bio only `getChat` exposes
    async fn get_user_profile(&self, user_id: i64) -> ApiResult<ProfileSnapshot>;

    async fn get_chat_info(&self, chat_id: i64) -> ApiResult<ChatInfo>;

    /// `getChat` for a public `@username`
    async fn get_chat_by_username(&self, username: &str) -> ApiResult<ChatInfo>;

    async fn export_invite_link(&self, chat_id: i64) -> ApiResult<String>;

    async fn get_me(&self) -> ApiResult<BotIdentity>;
}

/// Map a teloxide failure onto the retry/cleanup/skip buckets
pub fn classify_request_error(error: &RequestError) -> BotApiError {
    match error {
        RequestError::RetryAfter(seconds) => BotApiError::RateLimited(seconds.duration()),
        RequestError::Network(e) => BotApiError::Network(e.to_string()),
        RequestError::Io(e) => BotApiError::Network(e.to_string()),
        RequestError::Api(ApiError::InvalidToken) => BotApiError::InvalidToken,
        RequestError::Api(e) => BotApiError::from_description(&e.to_string()),
        RequestError::MigrateToChatId(id) => {
            BotApiError::BadRequest(format!("group migrated to supergroup {}", id))
        }
        other => BotApiError::Unexpected(other.to_string()),
    }
}

/// Run a Bot API call, sleeping through rate limits and retrying network
/// failures with linear backoff
pub async fn with_retry<T, F, Fut>(operation: &'static str, mut call: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut network_failures = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(BotApiError::RateLimited(retry_after)) => {
                let wait = retry_after.min(MAX_RETRY_AFTER);
                warn!(operation, retry_after_secs = wait.as_secs(), "Rate limited by Telegram, waiting");
                tokio::time::sleep(wait).await;
            }
            Err(BotApiError::Network(e)) if network_failures < NETWORK_RETRIES => {
                network_failures += 1;
                warn!(operation, attempt = network_failures, error = %e, "Network error, retrying");
                tokio::time::sleep(NETWORK_BACKOFF * network_failures).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.rows.iter().map(|row| {
        row.iter()
            .filter_map(|button| match &button.kind {
                ButtonKind::Callback(data) => {
                    Some(InlineKeyboardButton::callback(button.text.clone(), data.clone()))
                }
                ButtonKind::Url(url) => match url.parse::<url::Url>() {
                    Ok(url) => Some(InlineKeyboardButton::url(button.text.clone(), url)),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Skipping button with invalid URL");
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    });

    InlineKeyboardMarkup::new(rows)
}

fn user_id(id: i64) -> UserId {
    UserId(id as u64)
}

fn json_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// [`BotApi`] over a real `teloxide::Bot`
#[derive(Debug, Clone)]
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn inner(&self) -> &Bot {
        &self.bot
    }

    /// `getChat` in its Bot API JSON form
    async fn chat_json(&self, recipient: Recipient) -> ApiResult<serde_json::Value> {
        let chat = with_retry("get_chat", || async {
            self.bot
                .get_chat(recipient.clone())
                .await
                .map_err(|e| classify_request_error(&e))
        })
        .await?;

        serde_json::to_value(&chat).map_err(|e| BotApiError::Unexpected(e.to_string()))
    }
}

#[async_trait]
impl BotApi for TelegramBot {
    async fn send_message(&self, chat_id: i64, text: &str, options: SendOptions) -> ApiResult<i32> {
        let message = with_retry("send_message", || async {
            let mut request = self.bot.send_message(ChatId(chat_id), text);
            if options.html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Some(keyboard) = options.keyboard.as_ref().filter(|k| !k.is_empty()) {
                request = request.reply_markup(inline_markup(keyboard));
            }
            if let Some(reply_to) = options.reply_to {
                request = request
                    .reply_parameters(ReplyParameters::new(MessageId(reply_to)).allow_sending_without_reply());
            }
            if options.disable_preview {
                request = request.disable_link_preview(true);
            }
            request.await.map_err(|e| classify_request_error(&e))
        })
        .await?;

        debug!(chat_id, message_id = message.id.0, "Message sent");
        Ok(message.id.0)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        options: SendOptions,
    ) -> ApiResult<()> {
        with_retry("edit_message_text", || async {
            let mut request = self
                .bot
                .edit_message_text(ChatId(chat_id), MessageId(message_id), text);
            if options.html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Some(keyboard) = options.keyboard.as_ref() {
                request = request.reply_markup(inline_markup(keyboard));
            }
            request.await.map(|_| ()).map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> ApiResult<()> {
        with_retry("delete_message", || async {
            self.bot
                .delete_message(ChatId(chat_id), MessageId(message_id))
                .await
                .map(|_| ())
                .map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user: i64,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        with_retry("restrict_chat_member", || async {
            let mut request =
                self.bot
                    .restrict_chat_member(ChatId(chat_id), user_id(user), ChatPermissions::empty());
            if let Some(until) = until {
                request = request.until_date(until);
            }
            request.await.map(|_| ()).map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn lift_restrictions(&self, chat_id: i64, user: i64) -> ApiResult<()> {
        with_retry("lift_restrictions", || async {
            self.bot
                .restrict_chat_member(ChatId(chat_id), user_id(user), ChatPermissions::all())
                .await
                .map(|_| ())
                .map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn ban_chat_member(
        &self,
        chat_id: i64,
        user: i64,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        with_retry("ban_chat_member", || async {
            let mut request = self.bot.ban_chat_member(ChatId(chat_id), user_id(user));
            if let Some(until) = until {
                request = request.until_date(until);
            }
            request.await.map(|_| ()).map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn unban_chat_member(&self, chat_id: i64, user: i64) -> ApiResult<()> {
        with_retry("unban_chat_member", || async {
            self.bot
                .unban_chat_member(ChatId(chat_id), user_id(user))
                .only_if_banned(true)
                .await
                .map(|_| ())
                .map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn get_chat_member(&self, chat_id: i64, user: i64) -> ApiResult<MemberStatus> {
        let member = with_retry("get_chat_member", || async {
            self.bot
                .get_chat_member(ChatId(chat_id), user_id(user))
                .await
                .map_err(|e| classify_request_error(&e))
        })
        .await?;

        Ok(MemberStatus::from(&member.kind))
    }

    async fn get_user_profile(&self, user: i64) -> ApiResult<ProfileSnapshot> {
        let chat = self.chat_json(Recipient::Id(ChatId(user))).await?;

        Ok(ProfileSnapshot {
            user_id: user,
            first_name: json_str(&chat, "first_name"),
            last_name: json_str(&chat, "last_name"),
            username: json_str(&chat, "username"),
            bio: json_str(&chat, "bio"),
        })
    }

    async fn get_chat_info(&self, chat_id: i64) -> ApiResult<ChatInfo> {
        let chat = self.chat_json(Recipient::Id(ChatId(chat_id))).await?;

        Ok(ChatInfo {
            id: chat_id,
            title: json_str(&chat, "title"),
            username: json_str(&chat, "username"),
        })
    }

    async fn get_chat_by_username(&self, username: &str) -> ApiResult<ChatInfo> {
        let handle = format!("@{}", username.trim_start_matches('@'));
        let chat = self.chat_json(Recipient::ChannelUsername(handle)).await?;

        Ok(ChatInfo {
            id: chat.get("id").and_then(serde_json::Value::as_i64).unwrap_or_default(),
            title: json_str(&chat, "title"),
            username: json_str(&chat, "username"),
        })
    }

    async fn export_invite_link(&self, chat_id: i64) -> ApiResult<String> {
        with_retry("export_chat_invite_link", || async {
            self.bot
                .export_chat_invite_link(ChatId(chat_id))
                .await
                .map_err(|e| classify_request_error(&e))
        })
        .await
    }

    async fn get_me(&self) -> ApiResult<BotIdentity> {
        let me = with_retry("get_me", || async {
            self.bot.get_me().await.map_err(|e| classify_request_error(&e))
        })
        .await?;

        Ok(BotIdentity {
            id: me.user.id.0 as i64,
            username: me.user.username.clone().unwrap_or_default(),
        })
    }
}
