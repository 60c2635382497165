//! "Unmute me", "Admin approve" and "Verify" buttons

use teloxide::types::User;
use tracing::info;

use crate::handlers::callbacks::{edit, ButtonMessage, CallbackReply};
use crate::handlers::display_name;
use crate::i18n::params;
use crate::services::{AppContext, ApproveOutcome, SendOptions, UnmuteOutcome, VerifyOutcome};
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_duration, mention_html};
use crate::utils::logging::log_admin_action;

async fn known_name(ctx: &AppContext, user_id: i64) -> Result<String> {
    Ok(ctx
        .db
        .users
        .find_by_id(user_id)
        .await?
        .map(|user| user.full_name())
        .unwrap_or_else(|| user_id.to_string()))
}

async fn group_name(ctx: &AppContext, chat_id: i64) -> Result<String> {
    Ok(ctx
        .db
        .groups
        .find_by_id(chat_id)
        .await?
        .map(|group| group.display_name())
        .unwrap_or_else(|| chat_id.to_string()))
}

/// A muted user pressed "Unmute me", in the group or in private
pub async fn handle_unmute(
    ctx: &AppContext,
    lang: &str,
    presser: i64,
    chat_id: i64,
    target: i64,
    message: Option<ButtonMessage>,
) -> Result<CallbackReply> {
    if presser != target {
        return Ok(CallbackReply::alert(ctx.i18n.t("unmute.not_yours", lang, None)));
    }
    let private = message.is_some_and(|m| m.is_private());

    let reply = match ctx.unmute.request_unmute(chat_id, target).await? {
        UnmuteOutcome::Unmuted => {
            let text = if private {
                ctx.i18n.t(
                    "unmute.success_pm",
                    lang,
                    Some(&params([("group_name", escape_html(&group_name(ctx, chat_id).await?))])),
                )
            } else {
                let name = known_name(ctx, target).await?;
                ctx.i18n.t(
                    "unmute.success_group",
                    lang,
                    Some(&params([("user_mention", mention_html(target, &name))])),
                )
            };
            if let Some(message) = message {
                edit(ctx, message, &text, SendOptions::html()).await?;
            }
            CallbackReply::none()
        }
        UnmuteOutcome::RateLimited { wait_seconds } => CallbackReply::alert(ctx.i18n.t(
            "unmute.rate_limited",
            lang,
            Some(&params([("wait_duration", format_duration(wait_seconds))])),
        )),
        UnmuteOutcome::NotInChannel { channel_link } if private => {
            let text = ctx.i18n.t(
                "unmute.join_channel",
                lang,
                Some(&params([("channel_link", channel_link.unwrap_or_default())])),
            );
            ctx.api.send_message(presser, &text, SendOptions::html()).await?;
            CallbackReply::none()
        }
        UnmuteOutcome::NotInChannel { .. } => {
            CallbackReply::alert(ctx.i18n.t("unmute.join_channel_short", lang, None))
        }
        UnmuteOutcome::ProfileIssue(violation) => CallbackReply::alert(ctx.i18n.t(
            "unmute.profile_issue",
            lang,
            Some(&params([("field", violation.field.to_string())])),
        )),
        UnmuteOutcome::NoPermission => CallbackReply::alert(ctx.i18n.t("unmute.no_permission", lang, None)),
        UnmuteOutcome::NotApplicable => CallbackReply::alert(ctx.i18n.t("unmute.bad_request", lang, None)),
    };
    Ok(reply)
}

/// A chat admin pressed "Admin approve"
pub async fn handle_approve(
    ctx: &AppContext,
    lang: &str,
    admin: &User,
    chat_id: i64,
    target: i64,
    message: Option<ButtonMessage>,
) -> Result<CallbackReply> {
    let admin_id = crate::handlers::user_id(admin);
    if !ctx.auth.is_chat_admin(chat_id, admin_id).await {
        return Ok(CallbackReply::alert(ctx.i18n.t("gates.admin_only_button", lang, None)));
    }

    let outcome = ctx.unmute.approve(chat_id, target, admin_id).await?;
    log_admin_action(admin_id, "approve", Some(&target.to_string()), Some(&chat_id.to_string()));

    let text = match outcome {
        ApproveOutcome::Approved => {
            let name = known_name(ctx, target).await?;
            ctx.i18n.t(
                "unmute.approve_success",
                lang,
                Some(&params([
                    ("approved_user_mention", mention_html(target, &name)),
                    ("admin_mention", mention_html(admin_id, &display_name(admin))),
                ])),
            )
        }
        ApproveOutcome::ExemptedOnly { forbidden: true } => {
            ctx.i18n.t("unmute.approve_forbidden", lang, Some(&params([("user_id", target)])))
        }
        ApproveOutcome::ExemptedOnly { forbidden: false } => {
            ctx.i18n.t("unmute.approve_bad_request", lang, Some(&params([("user_id", target)])))
        }
    };
    info!(chat_id, user_id = target, admin_id, outcome = ?outcome, "Approve button handled");

    if let Some(message) = message {
        edit(ctx, message, &text, SendOptions::html()).await?;
    }
    Ok(CallbackReply::none())
}

/// "Verify channel join" under the /start message
pub async fn handle_verify(
    ctx: &AppContext,
    lang: &str,
    presser: i64,
    message: Option<ButtonMessage>,
) -> Result<CallbackReply> {
    match ctx.unmute.verify(presser).await? {
        VerifyOutcome::Verified => Ok(CallbackReply::alert(ctx.i18n.t("verify.verified", lang, None))),
        VerifyOutcome::NoChannel => Ok(CallbackReply::alert(ctx.i18n.t("verify.no_channel", lang, None))),
        VerifyOutcome::NotMember { channel_link } => {
            // the link only renders in a message, not in an alert
            let text = ctx.i18n.t(
                "verify.not_verified",
                lang,
                Some(&params([("channel_link", channel_link.unwrap_or_default())])),
            );
            let chat_id = message.map(|m| m.chat_id).unwrap_or(presser);
            ctx.api.send_message(chat_id, &text, SendOptions::html()).await?;
            Ok(CallbackReply::none())
        }
    }
}
