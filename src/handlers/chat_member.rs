//! The bot's own membership changes

use teloxide::types::ChatMemberUpdated;
use tracing::info;

use crate::i18n::params;
use crate::services::{AppContext, MemberStatus, SendOptions};
use crate::utils::errors::Result;
use crate::utils::logging::log_group_event;

/// Track groups the bot joins or leaves
pub async fn handle_my_chat_member(ctx: &AppContext, update: &ChatMemberUpdated) -> Result<()> {
    if !(update.chat.is_group() || update.chat.is_supergroup()) {
        return Ok(());
    }
    let chat_id = update.chat.id.0;
    let was_present = MemberStatus::from(&update.old_chat_member.kind).is_present();
    let is_present = MemberStatus::from(&update.new_chat_member.kind).is_present();

    match (was_present, is_present) {
        (false, true) => {
            ctx.ensure_group(chat_id, update.chat.title()).await?;
            log_group_event(chat_id, "bot_added", update.chat.title());
            let text = ctx.i18n.t(
                "bot.added_to_group",
                ctx.i18n.default_language(),
                Some(&params([("bot_name", format!("@{}", ctx.bot.username))])),
            );
            if let Err(e) = ctx.notifier.send(chat_id, &text, SendOptions::default()).await {
                info!(chat_id, error = %e, "Could not greet the group");
            }
        }
        (true, false) => {
            ctx.db.forget_group(chat_id).await?;
            log_group_event(chat_id, "bot_removed", None);
        }
        _ => {}
    }
    Ok(())
}
