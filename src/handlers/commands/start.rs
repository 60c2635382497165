//! Start and verify command handlers

use teloxide::types::{Message, User};
use tracing::{debug, info};

use crate::handlers::{display_name, is_group_chat, remember_user, reply, reply_t, reply_with, user_id};
use crate::i18n::params;
use crate::models::{Button, CallbackAction, Keyboard};
use crate::services::{AppContext, SendOptions, VerifyOutcome};
use crate::utils::errors::Result;
use crate::utils::helpers::mention_html;

/// Deep link payload sent by the punishment notice: `unmute_<chat_id>`
const UNMUTE_PAYLOAD_PREFIX: &str = "unmute_";

/// Chat ID carried by a `/start unmute_<chat>` deep link
pub fn unmute_payload(args: &str) -> Option<i64> {
    args.strip_prefix(UNMUTE_PAYLOAD_PREFIX)?.parse().ok()
}

/// Handle /start
pub async fn handle_start(ctx: &AppContext, msg: &Message, user: &User, lang: &str, args: &str) -> Result<()> {
    if is_group_chat(msg) {
        return reply_t(
            ctx,
            msg,
            lang,
            "start.group",
            Some(&params([("bot_username", ctx.bot.username.as_str())])),
        )
        .await;
    }

    remember_user(ctx, user, Some(true)).await?;
    let sender = user_id(user);

    if let Some(chat_id) = unmute_payload(args) {
        return show_unmute_prompt(ctx, msg, user, lang, chat_id).await;
    }

    let channel = ctx.unmute.verification_channel().await?;
    let mut text = ctx.i18n.t("start.private", lang, None);
    if channel.is_some() {
        text.push('\n');
        text.push_str(&ctx.i18n.t("start.channel_info", lang, None));
    }
    text.push('\n');
    text.push_str(&ctx.i18n.t("start.help_prompt", lang, None));

    let bot_username = params([("bot_username", ctx.bot.username.as_str())]);
    let mut rows = vec![vec![Button::url(
        ctx.i18n.t("start.add_to_group_button", lang, Some(&bot_username)),
        format!("https://t.me/{}?startgroup=true", ctx.bot.username),
    )]];
    if let Some(channel_id) = channel {
        if let Some(link) = ctx.unmute.channel_link(channel_id).await {
            rows.push(vec![Button::url(ctx.i18n.t("start.join_channel_button", lang, None), link)]);
        }
        rows.push(vec![Button::callback(
            ctx.i18n.t("start.verify_button", lang, None),
            CallbackAction::Verify.data(),
        )]);
    }

    info!(user_id = sender, "User started the bot");
    reply_with(ctx, msg, &text, SendOptions::html().with_keyboard(Keyboard::new(rows))).await
}

/// Private prompt with an "Unmute me" button for one group
async fn show_unmute_prompt(ctx: &AppContext, msg: &Message, user: &User, lang: &str, chat_id: i64) -> Result<()> {
    let sender = user_id(user);
    let group_name = match ctx.db.groups.find_by_id(chat_id).await? {
        Some(group) => group.display_name(),
        None => chat_id.to_string(),
    };
    debug!(user_id = sender, chat_id, "Unmute deep link opened");

    let text = ctx.i18n.t(
        "unmute.pm_welcome",
        lang,
        Some(&params([
            ("user_mention", mention_html(sender, &display_name(user))),
            ("group_name", crate::utils::helpers::escape_html(&group_name)),
        ])),
    );
    let keyboard = Keyboard::single(Button::callback(
        ctx.i18n.t("unmute.pm_button", lang, None),
        CallbackAction::Unmute {
            chat_id,
            user_id: sender,
        }
        .data(),
    ));
    reply_with(ctx, msg, &text, SendOptions::html().with_keyboard(keyboard)).await
}

/// Handle /verify
pub async fn handle_verify(ctx: &AppContext, msg: &Message, user: &User, lang: &str) -> Result<()> {
    let text = verify_text(ctx, user_id(user), lang).await?;
    reply(ctx, msg, &text).await
}

/// Message describing the verification state of a user
pub async fn verify_text(ctx: &AppContext, user_id: i64, lang: &str) -> Result<String> {
    let text = match ctx.unmute.verify(user_id).await? {
        VerifyOutcome::NoChannel => ctx.i18n.t("verify.no_channel", lang, None),
        VerifyOutcome::Verified => ctx.i18n.t("verify.verified", lang, None),
        VerifyOutcome::NotMember { channel_link } => ctx.i18n.t(
            "verify.not_verified",
            lang,
            Some(&params([("channel_link", channel_link.unwrap_or_default())])),
        ),
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmute_payload() {
        assert_eq!(unmute_payload("unmute_-100123"), Some(-100123));
        assert_eq!(unmute_payload("unmute_abc"), None);
        assert_eq!(unmute_payload(""), None);
        assert_eq!(unmute_payload("hello"), None);
    }
}
