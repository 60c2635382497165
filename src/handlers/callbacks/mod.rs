//! Callback query handlers module
//!
//! Button presses are parsed into a [`CallbackAction`] and routed. The
//! returned [`CallbackReply`] is shown by the dispatcher when it answers
//! the query.

pub mod settings;
pub mod unmute;

use teloxide::types::CallbackQuery;
use tracing::{debug, warn};

use crate::handlers::{user_id, user_language};
use crate::models::CallbackAction;
use crate::services::{AppContext, SendOptions};
use crate::utils::errors::Result;

/// Text shown to the user who pressed a button
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackReply {
    pub text: Option<String>,
    /// Modal alert instead of a toast
    pub alert: bool,
}

impl CallbackReply {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            alert: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            alert: true,
        }
    }
}

/// The message a button was attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

impl ButtonMessage {
    pub fn of(query: &CallbackQuery) -> Option<Self> {
        query.message.as_ref().map(|message| Self {
            chat_id: message.chat().id.0,
            message_id: message.id().0,
        })
    }

    /// Pressed in a private chat with the bot
    pub fn is_private(&self) -> bool {
        self.chat_id > 0
    }
}

/// Replace the text (and buttons) of the message carrying the button
pub(crate) async fn edit(ctx: &AppContext, message: ButtonMessage, text: &str, options: SendOptions) -> Result<()> {
    if let Err(e) = ctx
        .api
        .edit_message_text(message.chat_id, message.message_id, text, options.without_preview())
        .await
    {
        warn!(chat_id = message.chat_id, message_id = message.message_id, error = %e, "Could not edit message");
    }
    Ok(())
}

/// Route a button press
pub async fn handle_callback_query(ctx: &AppContext, query: &CallbackQuery) -> Result<CallbackReply> {
    let presser = user_id(&query.from);
    let lang = user_language(ctx, &query.from);

    let Some(data) = query.data.as_deref() else {
        return Ok(CallbackReply::none());
    };
    let action = match data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!(user_id = presser, data, error = %e, "Unknown callback data");
            return Ok(CallbackReply::none());
        }
    };
    let message = ButtonMessage::of(query);
    debug!(user_id = presser, action = ?action, "Processing callback");

    match action {
        CallbackAction::Unmute { chat_id, user_id } => {
            unmute::handle_unmute(ctx, &lang, presser, chat_id, user_id, message).await
        }
        CallbackAction::Approve { chat_id, user_id } => {
            unmute::handle_approve(ctx, &lang, &query.from, chat_id, user_id, message).await
        }
        CallbackAction::Verify => unmute::handle_verify(ctx, &lang, presser, message).await,
        settings_action => {
            let Some(message) = message else {
                return Ok(CallbackReply::none());
            };
            settings::handle_settings(ctx, &lang, presser, message, settings_action).await
        }
    }
}
