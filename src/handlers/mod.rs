//! Bot handlers module
//!
//! Telegram updates enter here and are routed by type:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard buttons
//! - Message handlers running the moderation pipeline
//! - Chat member handlers tracking the groups the bot is in

pub mod callbacks;
pub mod chat_member;
pub mod commands;
pub mod messages;

pub use callbacks::{handle_callback_query, CallbackReply};
pub use chat_member::handle_my_chat_member;
pub use commands::{handle_command, Command};
pub use messages::{handle_edited_message, handle_message};

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::payloads::AnswerCallbackQuerySetters;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatMemberUpdated, Message, Update, User};
use tracing::{error, warn};

use crate::i18n::TranslationParams;
use crate::models::UpsertUserRequest;
use crate::services::{AppContext, ProfileSnapshot, SendOptions};
use crate::utils::errors::Result;
use crate::utils::helpers::{parse_user_reference, UserReference};

/// Error type of dispatcher endpoints
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
type HandlerResult = std::result::Result<(), HandlerError>;

/// The update handler tree
pub fn schema() -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_endpoint),
                )
                .branch(dptree::endpoint(message_endpoint)),
        )
        .branch(Update::filter_edited_message().endpoint(edited_message_endpoint))
        .branch(Update::filter_callback_query().endpoint(callback_endpoint))
        .branch(Update::filter_my_chat_member().endpoint(chat_member_endpoint))
}

async fn command_endpoint(msg: Message, cmd: Command, ctx: Arc<AppContext>) -> HandlerResult {
    if let Err(e) = handle_command(&ctx, &msg, cmd).await {
        error!(chat_id = msg.chat.id.0, error = %e, "Error handling command");
    }
    Ok(())
}

async fn message_endpoint(msg: Message, ctx: Arc<AppContext>) -> HandlerResult {
    if let Err(e) = handle_message(&ctx, &msg).await {
        error!(chat_id = msg.chat.id.0, error = %e, "Error handling message");
    }
    Ok(())
}

async fn edited_message_endpoint(msg: Message, ctx: Arc<AppContext>) -> HandlerResult {
    if let Err(e) = handle_edited_message(&ctx, &msg).await {
        error!(chat_id = msg.chat.id.0, error = %e, "Error handling edited message");
    }
    Ok(())
}

async fn callback_endpoint(bot: Bot, query: CallbackQuery, ctx: Arc<AppContext>) -> HandlerResult {
    let reply = match handle_callback_query(&ctx, &query).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(user_id = query.from.id.0, data = ?query.data, error = %e, "Error handling callback query");
            CallbackReply::alert(ctx.i18n.t(
                "errors.generic",
                &user_language(&ctx, &query.from),
                Some(&crate::i18n::params([("error", e.to_string())])),
            ))
        }
    };

    // Always answer so the client stops its loading indicator
    let mut answer = bot.answer_callback_query(query.id.clone());
    if let Some(text) = reply.text {
        answer = answer.text(text).show_alert(reply.alert);
    }
    if let Err(e) = answer.await {
        warn!(error = %e, callback_id = %query.id, "Failed to answer callback query");
    }
    Ok(())
}

async fn chat_member_endpoint(update: ChatMemberUpdated, ctx: Arc<AppContext>) -> HandlerResult {
    if let Err(e) = handle_my_chat_member(&ctx, &update).await {
        error!(chat_id = update.chat.id.0, error = %e, "Error handling chat member update");
    }
    Ok(())
}

pub(crate) fn user_id(user: &User) -> i64 {
    user.id.0 as i64
}

/// Language of a Telegram user, default when unsupported
pub(crate) fn user_language(ctx: &AppContext, user: &User) -> String {
    ctx.i18n.detect_user_language(user.language_code.as_deref())
}

pub(crate) fn profile_of(user: &User) -> ProfileSnapshot {
    ProfileSnapshot {
        user_id: user_id(user),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        bio: None,
    }
}

pub(crate) fn display_name(user: &User) -> String {
    crate::services::moderation::display_name(&profile_of(user))
}

pub(crate) fn is_group_chat(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

/// Upsert the user behind an interaction
pub(crate) async fn remember_user(ctx: &AppContext, user: &User, started: Option<bool>) -> Result<()> {
    ctx.db
        .users
        .upsert(
            UpsertUserRequest {
                id: user_id(user),
                username: user.username.clone(),
                first_name: Some(user.first_name.clone()),
                last_name: user.last_name.clone(),
                has_started_bot: started,
            },
            ctx.clock.now(),
        )
        .await?;
    Ok(())
}

/// Reply in the chat of a message, HTML formatted
pub(crate) async fn reply(ctx: &AppContext, msg: &Message, text: &str) -> Result<()> {
    reply_with(ctx, msg, text, SendOptions::html()).await
}

pub(crate) async fn reply_with(
    ctx: &AppContext,
    msg: &Message,
    text: &str,
    options: SendOptions,
) -> Result<()> {
    ctx.api
        .send_message(msg.chat.id.0, text, options.reply_to(msg.id.0).without_preview())
        .await?;
    Ok(())
}

/// Translated reply in the sender's language
pub(crate) async fn reply_t(
    ctx: &AppContext,
    msg: &Message,
    lang: &str,
    key: &str,
    params: Option<&TranslationParams>,
) -> Result<()> {
    reply(ctx, msg, &ctx.i18n.t(key, lang, params)).await
}

/// User targeted by an admin command: the author of the replied-to
/// message, else a numeric ID or a known `@username` in the argument
pub(crate) async fn resolve_target(ctx: &AppContext, msg: &Message, arg: &str) -> Result<Option<i64>> {
    if let Some(user) = msg.reply_to_message().and_then(|reply| reply.from.as_ref()) {
        return Ok(Some(user_id(user)));
    }
    match parse_user_reference(arg) {
        Some(UserReference::Id(id)) => Ok(Some(id)),
        Some(UserReference::Username(username)) => Ok(ctx
            .db
            .users
            .find_by_username(&username)
            .await?
            .map(|user| user.id)),
        None => Ok(None),
    }
}
