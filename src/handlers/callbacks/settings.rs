//! Punishment settings buttons: action picker, batch operations and
//! duration presets. Only chat admins may press them.

use tracing::info;

use crate::handlers::callbacks::{edit, ButtonMessage, CallbackReply};
use crate::handlers::commands::moderation::{
    apply_action, apply_duration, batch_keyboard, punish_keyboard, punish_prompt,
};
use crate::i18n::params;
use crate::models::CallbackAction;
use crate::services::{AppContext, SendOptions};
use crate::utils::errors::Result;
use crate::utils::logging::log_admin_action;

pub async fn handle_settings(
    ctx: &AppContext,
    lang: &str,
    presser: i64,
    message: ButtonMessage,
    action: CallbackAction,
) -> Result<CallbackReply> {
    if message.is_private() {
        return Ok(CallbackReply::alert(ctx.i18n.t("gates.group_only", lang, None)));
    }
    let chat_id = message.chat_id;
    if !ctx.auth.is_chat_admin(chat_id, presser).await {
        return Ok(CallbackReply::alert(ctx.i18n.t("gates.admin_only_button", lang, None)));
    }
    let group = ctx.ensure_group(chat_id, None).await?;

    match action {
        CallbackAction::SetPunish(punish) => {
            let text = apply_action(ctx, lang, chat_id, punish).await?;
            log_admin_action(presser, "setpunish", Some(&chat_id.to_string()), Some(punish.as_str()));
            edit(ctx, message, &text, SendOptions::html()).await?;
        }
        CallbackAction::BatchMenu => {
            let text = ctx.i18n.t("setpunish.batch_prompt", lang, None);
            edit(ctx, message, &text, SendOptions::html().with_keyboard(batch_keyboard(ctx, lang))).await?;
        }
        CallbackAction::PunishMenu => {
            let keyboard = punish_keyboard(ctx, lang, group.punish_action);
            edit(ctx, message, &punish_prompt(ctx, lang, &group), SendOptions::html().with_keyboard(keyboard))
                .await?;
        }
        CallbackAction::Batch(punish) => {
            let (applied, failed) = ctx.moderation.punishments().batch_apply(&group, punish).await?;
            log_admin_action(
                presser,
                "batch",
                Some(&chat_id.to_string()),
                Some(&format!("{} applied={} failed={}", punish, applied, failed)),
            );
            let text = ctx.i18n.t(
                "setpunish.batch_done",
                lang,
                Some(&params([
                    ("action", punish.as_str().to_string()),
                    ("count", applied.to_string()),
                    ("failed", failed.to_string()),
                ])),
            );
            edit(ctx, message, &text, SendOptions::html()).await?;
        }
        CallbackAction::SetDuration { trigger, seconds } => {
            let text = apply_duration(ctx, lang, chat_id, trigger, seconds).await?;
            log_admin_action(
                presser,
                "setduration",
                Some(&chat_id.to_string()),
                Some(&format!("{}={}", trigger.map(|t| t.as_str()).unwrap_or("all"), seconds)),
            );
            edit(ctx, message, &text, SendOptions::html()).await?;
        }
        other => {
            info!(action = ?other, "Not a settings button");
        }
    }
    Ok(CallbackReply::none())
}
