//! Message handlers module
//!
//! Runs group messages (new or edited) and new members through the
//! moderation pipeline. Admins and exempt users are skipped, as is
//! everything while maintenance mode is on or message processing is
//! disabled.

use teloxide::types::{Message, MessageEntityKind, User};
use tracing::{debug, warn};

use crate::handlers::{is_group_chat, profile_of, remember_user, user_id};
use crate::models::Group;
use crate::services::{AppContext, IncomingMessage, RawMention};
use crate::utils::errors::Result;

/// Handle a new message
pub async fn handle_message(ctx: &AppContext, msg: &Message) -> Result<()> {
    if let Some(members) = msg.new_chat_members() {
        return handle_new_chat_members(ctx, msg, members).await;
    }
    moderate(ctx, msg).await
}

/// Edited messages get the same checks as new ones
pub async fn handle_edited_message(ctx: &AppContext, msg: &Message) -> Result<()> {
    moderate(ctx, msg).await
}

/// Mentions carried by the entities of a text or caption
pub fn entity_mentions(msg: &Message) -> Vec<RawMention> {
    let entities = msg.parse_entities().or_else(|| msg.parse_caption_entities());
    entities
        .unwrap_or_default()
        .iter()
        .filter_map(|entity| match entity.kind() {
            MessageEntityKind::Mention => Some(RawMention::Username(
                entity.text().trim_start_matches('@').to_string(),
            )),
            MessageEntityKind::TextMention { user } => Some(RawMention::TextMention {
                user_id: user_id(user),
                first_name: user.first_name.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Group row and membership for a message's chat and sender
async fn track_group(ctx: &AppContext, msg: &Message, user: &User) -> Result<Group> {
    let chat_id = msg.chat.id.0;
    let group = ctx.ensure_group(chat_id, msg.chat.title()).await?;
    ctx.db.groups.add_member(chat_id, user_id(user), ctx.clock.now()).await?;
    Ok(group)
}

/// Whether a member of a group is subject to moderation
async fn is_moderated(ctx: &AppContext, chat_id: i64, user_id: i64) -> Result<bool> {
    if ctx.auth.is_chat_admin(chat_id, user_id).await {
        return Ok(false);
    }
    Ok(!ctx.auth.is_exempt(chat_id, user_id).await?)
}

async fn moderate(ctx: &AppContext, msg: &Message) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    // Anonymous admins and linked channels post on behalf of a chat
    if msg.sender_chat.is_some() || user_id(user) == ctx.bot.id {
        return Ok(());
    }

    remember_user(ctx, user, None).await?;
    if !is_group_chat(msg) {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let sender = user_id(user);
    let group = track_group(ctx, msg, user).await?;

    if !ctx.auth.message_processing_enabled().await? {
        debug!(chat_id, "Message processing is off");
        return Ok(());
    }
    if !is_moderated(ctx, chat_id, sender).await? {
        return Ok(());
    }

    let incoming = IncomingMessage {
        chat_id,
        message_id: msg.id.0,
        sender: profile_of(user),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        entity_mentions: entity_mentions(msg),
    };
    ctx.moderation.moderate_message(&group, &incoming).await?;
    Ok(())
}

/// Profile check of users joining a group
async fn handle_new_chat_members(ctx: &AppContext, msg: &Message, members: &[User]) -> Result<()> {
    if !is_group_chat(msg) {
        return Ok(());
    }
    let chat_id = msg.chat.id.0;
    let group = ctx.ensure_group(chat_id, msg.chat.title()).await?;
    let processing = ctx.auth.message_processing_enabled().await?;

    for member in members.iter().filter(|member| !member.is_bot) {
        let member_id = user_id(member);
        remember_user(ctx, member, None).await?;
        ctx.db.groups.add_member(chat_id, member_id, ctx.clock.now()).await?;
        debug!(chat_id, user_id = member_id, "New member joined chat");

        if !processing || !is_moderated(ctx, chat_id, member_id).await? {
            continue;
        }
        if let Err(e) = ctx.moderation.moderate_new_member(&group, &profile_of(member)).await {
            warn!(chat_id, user_id = member_id, error = %e, "Failed to check new member");
        }
    }
    Ok(())
}
