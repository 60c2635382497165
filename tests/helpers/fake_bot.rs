//! In-process stand-in for the Telegram Bot API
//!
//! Records every mutating call and answers lookups from configurable
//! tables. Chats marked forbidden fail every call with `Forbidden`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use BardSentinel::services::telegram::ChatInfo;
use BardSentinel::services::{BotApi, BotIdentity, MemberStatus, ProfileSnapshot, SendOptions};
use BardSentinel::utils::errors::{ApiResult, BotApiError};

pub const BOT_ID: i64 = 999_000;
pub const BOT_USERNAME: &str = "sentinel_test_bot";

/// A mutating call made against the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Send { chat_id: i64, text: String },
    Edit { chat_id: i64, message_id: i32, text: String },
    Delete { chat_id: i64, message_id: i32 },
    Restrict { chat_id: i64, user_id: i64, until: Option<DateTime<Utc>> },
    Lift { chat_id: i64, user_id: i64 },
    Ban { chat_id: i64, user_id: i64, until: Option<DateTime<Utc>> },
    Unban { chat_id: i64, user_id: i64 },
}

/// How a member lookup should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    UnknownUser,
    Network,
}

#[derive(Debug, Default)]
pub struct FakeBot {
    calls: Mutex<Vec<ApiCall>>,
    profiles: Mutex<HashMap<i64, ProfileSnapshot>>,
    members: Mutex<HashMap<(i64, i64), MemberStatus>>,
    chats: Mutex<HashMap<i64, ChatInfo>>,
    forbidden: Mutex<HashSet<i64>>,
    lookup_failures: Mutex<HashMap<(i64, i64), LookupFailure>>,
    next_message_id: AtomicI32,
}

impl FakeBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_message_id: AtomicI32::new(1000),
            ..Self::default()
        })
    }

    pub fn set_profile(&self, profile: ProfileSnapshot) {
        self.profiles.lock().unwrap().insert(profile.user_id, profile);
    }

    pub fn set_member(&self, chat_id: i64, user_id: i64, status: MemberStatus) {
        self.members.lock().unwrap().insert((chat_id, user_id), status);
    }

    pub fn add_chat(&self, info: ChatInfo) {
        self.chats.lock().unwrap().insert(info.id, info);
    }

    pub fn forbid(&self, chat_id: i64) {
        self.forbidden.lock().unwrap().insert(chat_id);
    }

    pub fn fail_member_lookup(&self, chat_id: i64, user_id: i64, failure: LookupFailure) {
        self.lookup_failures.lock().unwrap().insert((chat_id, user_id), failure);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts sent to a chat, oldest first
    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Send { chat_id: to, text } if to == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn check(&self, chat_id: i64) -> ApiResult<()> {
        if self.forbidden.lock().unwrap().contains(&chat_id) {
            return Err(BotApiError::Forbidden(format!("Forbidden: chat {} blocked the bot", chat_id)));
        }
        Ok(())
    }

    fn record(&self, chat_id: i64, call: ApiCall) -> ApiResult<()> {
        self.check(chat_id)?;
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl BotApi for FakeBot {
    async fn send_message(&self, chat_id: i64, text: &str, _options: SendOptions) -> ApiResult<i32> {
        self.record(chat_id, ApiCall::Send { chat_id, text: text.to_string() })?;
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        _options: SendOptions,
    ) -> ApiResult<()> {
        self.record(chat_id, ApiCall::Edit { chat_id, message_id, text: text.to_string() })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> ApiResult<()> {
        self.record(chat_id, ApiCall::Delete { chat_id, message_id })
    }

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        self.record(chat_id, ApiCall::Restrict { chat_id, user_id, until })
    }

    async fn lift_restrictions(&self, chat_id: i64, user_id: i64) -> ApiResult<()> {
        self.record(chat_id, ApiCall::Lift { chat_id, user_id })
    }

    async fn ban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        self.record(chat_id, ApiCall::Ban { chat_id, user_id, until })
    }

    async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> ApiResult<()> {
        self.record(chat_id, ApiCall::Unban { chat_id, user_id })
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> ApiResult<MemberStatus> {
        self.check(chat_id)?;
        match self.lookup_failures.lock().unwrap().get(&(chat_id, user_id)) {
            Some(LookupFailure::UnknownUser) => {
                return Err(BotApiError::BadRequest("Bad Request: user not found".to_string()))
            }
            Some(LookupFailure::Network) => {
                return Err(BotApiError::Network("connection reset".to_string()))
            }
            None => {}
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&(chat_id, user_id))
            .copied()
            .unwrap_or(MemberStatus::Member))
    }

    async fn get_user_profile(&self, user_id: i64) -> ApiResult<ProfileSnapshot> {
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| BotApiError::BadRequest("Bad Request: chat not found".to_string()))
    }

    async fn get_chat_info(&self, chat_id: i64) -> ApiResult<ChatInfo> {
        self.check(chat_id)?;
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| BotApiError::BadRequest("Bad Request: chat not found".to_string()))
    }

    async fn get_chat_by_username(&self, username: &str) -> ApiResult<ChatInfo> {
        let wanted = username.trim_start_matches('@').to_lowercase();
        self.chats
            .lock()
            .unwrap()
            .values()
            .find(|chat| chat.username.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str()))
            .cloned()
            .ok_or_else(|| BotApiError::BadRequest("Bad Request: chat not found".to_string()))
    }

    async fn export_invite_link(&self, chat_id: i64) -> ApiResult<String> {
        self.check(chat_id)?;
        Ok(format!("https://t.me/+invite{}", chat_id.unsigned_abs()))
    }

    async fn get_me(&self) -> ApiResult<BotIdentity> {
        Ok(BotIdentity {
            id: BOT_ID,
            username: BOT_USERNAME.to_string(),
        })
    }
}
