//! Help command handler

use teloxide::types::Message;

use crate::handlers::{is_group_chat, reply_t};
use crate::services::AppContext;
use crate::utils::errors::Result;

/// Handle /help: the full guide in private, a short one in groups
pub async fn handle_help(ctx: &AppContext, msg: &Message, lang: &str) -> Result<()> {
    let key = if is_group_chat(msg) { "help.group" } else { "help.private" };
    reply_t(ctx, msg, lang, key, None).await
}
