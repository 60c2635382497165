//! Group admin commands: punishment settings and per-group exemptions

use teloxide::types::Message;
use tracing::info;

use crate::handlers::{reply_t, reply_with, resolve_target, user_id};
use crate::i18n::params;
use crate::models::{
    Button, CallbackAction, Group, Keyboard, PunishAction, TriggerType, UpdateGroupPunishment,
};
use crate::services::{AppContext, SendOptions};
use crate::utils::errors::Result;
use crate::utils::helpers::{format_duration, parse_duration};
use crate::utils::logging::log_admin_action;

/// Durations offered as buttons
pub const DURATION_PRESETS: [(&str, u64); 4] = [("30m", 1800), ("1h", 3600), ("1d", 86_400), ("7d", 604_800)];

/// Action picker, with batch operations while the action is mute
pub fn punish_keyboard(ctx: &AppContext, lang: &str, current: PunishAction) -> Keyboard {
    let button = |key: &str, action: PunishAction| {
        Button::callback(ctx.i18n.t(key, lang, None), CallbackAction::SetPunish(action).data())
    };
    let mut rows = vec![vec![
        button("setpunish.mute_button", PunishAction::Mute),
        button("setpunish.kick_button", PunishAction::Kick),
        button("setpunish.ban_button", PunishAction::Ban),
    ]];
    if current == PunishAction::Mute {
        rows.push(vec![Button::callback(
            ctx.i18n.t("setpunish.batch_button", lang, None),
            CallbackAction::BatchMenu.data(),
        )]);
    }
    Keyboard::new(rows)
}

pub fn batch_keyboard(ctx: &AppContext, lang: &str) -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::callback(
                ctx.i18n.t("setpunish.batch_kick_button", lang, None),
                CallbackAction::Batch(PunishAction::Kick).data(),
            ),
            Button::callback(
                ctx.i18n.t("setpunish.batch_ban_button", lang, None),
                CallbackAction::Batch(PunishAction::Ban).data(),
            ),
        ],
        vec![Button::callback(
            ctx.i18n.t("setpunish.back_button", lang, None),
            CallbackAction::PunishMenu.data(),
        )],
    ])
}

pub fn punish_prompt(ctx: &AppContext, lang: &str, group: &Group) -> String {
    ctx.i18n.t(
        "setpunish.prompt",
        lang,
        Some(&params([("current_action", group.punish_action.as_str())])),
    )
}

/// Preset buttons for one trigger type, or all of them
pub fn duration_keyboard(ctx: &AppContext, lang: &str, trigger: Option<TriggerType>) -> Keyboard {
    let presets = DURATION_PRESETS
        .iter()
        .map(|(label, seconds)| {
            Button::callback(
                *label,
                CallbackAction::SetDuration {
                    trigger,
                    seconds: *seconds,
                }
                .data(),
            )
        })
        .collect();
    let permanent = Button::callback(
        ctx.i18n.t("setduration.permanent_button", lang, None),
        CallbackAction::SetDuration { trigger, seconds: 0 }.data(),
    );
    Keyboard::new(vec![presets, vec![permanent]])
}

fn duration_prompt(ctx: &AppContext, lang: &str, group: &Group, trigger: Option<TriggerType>) -> String {
    match trigger {
        None => ctx.i18n.t(
            "setduration.prompt_all",
            lang,
            Some(&params([
                ("profile", format_duration(group.duration_for(TriggerType::Profile))),
                ("message", format_duration(group.duration_for(TriggerType::Message))),
                ("mention", format_duration(group.duration_for(TriggerType::MentionProfile))),
            ])),
        ),
        Some(trigger) => ctx.i18n.t(
            "setduration.prompt_single",
            lang,
            Some(&params([
                ("trigger_type", trigger.to_string()),
                ("current_duration", format_duration(group.duration_for(trigger))),
            ])),
        ),
    }
}

/// Store a new duration and render the confirmation
pub async fn apply_duration(
    ctx: &AppContext,
    lang: &str,
    group_id: i64,
    trigger: Option<TriggerType>,
    seconds: u64,
) -> Result<String> {
    let update = match trigger {
        None => UpdateGroupPunishment::all_durations(seconds),
        Some(trigger) => UpdateGroupPunishment::duration(trigger, seconds),
    };
    ctx.db.groups.update_punishment(group_id, update).await?;

    let duration = format_duration(seconds);
    let text = match trigger {
        None => ctx.i18n.t("setduration.success_all", lang, Some(&params([("duration", duration)]))),
        Some(trigger) => ctx.i18n.t(
            "setduration.success_single",
            lang,
            Some(&params([
                ("trigger_type", trigger.to_string()),
                ("duration", duration),
            ])),
        ),
    };
    Ok(text)
}

/// Store a new action and render the confirmation
pub async fn apply_action(ctx: &AppContext, lang: &str, group_id: i64, action: PunishAction) -> Result<String> {
    ctx.db
        .groups
        .update_punishment(
            group_id,
            UpdateGroupPunishment {
                action: Some(action),
                ..UpdateGroupPunishment::default()
            },
        )
        .await?;
    Ok(ctx
        .i18n
        .t("setpunish.success", lang, Some(&params([("action", action.as_str())]))))
}

/// Handle /setpunish
pub async fn handle_setpunish(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    let group = ctx.ensure_group(msg.chat.id.0, msg.chat.title()).await?;

    if arg.is_empty() {
        let keyboard = punish_keyboard(ctx, lang, group.punish_action);
        return reply_with(
            ctx,
            msg,
            &punish_prompt(ctx, lang, &group),
            SendOptions::html().with_keyboard(keyboard),
        )
        .await;
    }

    match arg.parse::<PunishAction>() {
        Ok(action) => {
            let text = apply_action(ctx, lang, group.id, action).await?;
            if let Some(admin) = msg.from.as_ref() {
                log_admin_action(user_id(admin), "setpunish", Some(&group.id.to_string()), Some(action.as_str()));
            }
            reply_with(ctx, msg, &text, SendOptions::html()).await
        }
        Err(_) => {
            reply_t(ctx, msg, lang, "setpunish.invalid", Some(&params([("action", arg)]))).await
        }
    }
}

/// Handle /setduration and its per-trigger variants
pub async fn handle_setduration(
    ctx: &AppContext,
    msg: &Message,
    lang: &str,
    trigger: Option<TriggerType>,
    arg: &str,
) -> Result<()> {
    let group = ctx.ensure_group(msg.chat.id.0, msg.chat.title()).await?;

    if arg.is_empty() {
        return reply_with(
            ctx,
            msg,
            &duration_prompt(ctx, lang, &group, trigger),
            SendOptions::html().with_keyboard(duration_keyboard(ctx, lang, trigger)),
        )
        .await;
    }

    let Some(seconds) = parse_duration(arg) else {
        return reply_t(ctx, msg, lang, "setduration.invalid", Some(&params([("duration_str", arg)]))).await;
    };

    let text = apply_duration(ctx, lang, group.id, trigger, seconds).await?;
    if let Some(admin) = msg.from.as_ref() {
        let what = trigger.map(|t| t.as_str()).unwrap_or("all");
        log_admin_action(
            user_id(admin),
            "setduration",
            Some(&group.id.to_string()),
            Some(&format!("{}={}", what, seconds)),
        );
    }
    reply_with(ctx, msg, &text, SendOptions::html()).await
}

/// Handle /freepunish (`exempt`) and /unfreepunish
pub async fn handle_freepunish(ctx: &AppContext, msg: &Message, lang: &str, arg: &str, exempt: bool) -> Result<()> {
    let (usage, success, unchanged) = if exempt {
        ("exemptions.freepunish_usage", "exemptions.freepunish_success", "exemptions.freepunish_already")
    } else {
        ("exemptions.unfreepunish_usage", "exemptions.unfreepunish_success", "exemptions.unfreepunish_missing")
    };

    let Some(target) = resolve_target(ctx, msg, arg).await? else {
        return reply_t(ctx, msg, lang, usage, None).await;
    };

    let chat_id = msg.chat.id.0;
    let changed = ctx
        .auth
        .set_group_exemption(chat_id, target, exempt, ctx.clock.now())
        .await?;
    if exempt {
        ctx.moderation.profiles().forget(target);
    }

    if let Some(admin) = msg.from.as_ref() {
        let action = if exempt { "freepunish" } else { "unfreepunish" };
        log_admin_action(user_id(admin), action, Some(&target.to_string()), Some(&chat_id.to_string()));
    }
    info!(chat_id, user_id = target, exempt, changed, "Group exemption command");

    let key = if changed { success } else { unchanged };
    reply_t(ctx, msg, lang, key, Some(&params([("user_id", target)]))).await
}
