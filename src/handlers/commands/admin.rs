//! Super admin command handlers

use teloxide::types::Message;
use tracing::{info, warn};

use crate::handlers::{reply, reply_t, resolve_target, user_id};
use crate::i18n::params;
use crate::middleware::auth::CRITICAL_FEATURES;
use crate::services::telegram::ChatInfo;
use crate::services::{AppContext, UnmuteAllReport};
use crate::utils::errors::{BotApiError, Result};
use crate::utils::helpers::{escape_html, format_duration};
use crate::utils::logging::log_admin_action;

fn admin_id(msg: &Message) -> i64 {
    msg.from.as_ref().map(user_id).unwrap_or_default()
}

/// Handle /gfreepunish (`exempt`) and /gunfreepunish
pub async fn handle_global_exemption(
    ctx: &AppContext,
    msg: &Message,
    lang: &str,
    arg: &str,
    exempt: bool,
) -> Result<()> {
    let (usage, success, unchanged) = if exempt {
        ("exemptions.gfreepunish_usage", "exemptions.gfreepunish_success", "exemptions.gfreepunish_already")
    } else {
        ("exemptions.gunfreepunish_usage", "exemptions.gunfreepunish_success", "exemptions.gunfreepunish_missing")
    };

    if arg.is_empty() && msg.reply_to_message().is_none() {
        return reply_t(ctx, msg, lang, usage, None).await;
    }
    let Some(target) = resolve_target(ctx, msg, arg).await? else {
        return reply_t(
            ctx,
            msg,
            lang,
            "errors.user_not_found",
            Some(&params([("identifier", escape_html(arg))])),
        )
        .await;
    };

    let changed = ctx.auth.set_global_exemption(target, exempt, ctx.clock.now()).await?;
    if exempt {
        ctx.moderation.profiles().forget(target);
    }
    log_admin_action(
        admin_id(msg),
        if exempt { "gfreepunish" } else { "gunfreepunish" },
        Some(&target.to_string()),
        None,
    );

    let key = if changed { success } else { unchanged };
    reply_t(ctx, msg, lang, key, Some(&params([("user_id", target)]))).await
}

/// Handle /clearcache
pub async fn handle_clearcache(ctx: &AppContext, msg: &Message, lang: &str) -> Result<()> {
    let (profiles, usernames) = ctx.clear_caches();
    log_admin_action(admin_id(msg), "clearcache", None, Some(&format!("{} profiles, {} usernames", profiles, usernames)));
    reply_t(
        ctx,
        msg,
        lang,
        "admin.clearcache_success",
        Some(&params([("profile_count", profiles), ("username_count", usernames)])),
    )
    .await
}

/// Handle /checkbio: fetch a profile and run the checker on it, read only
pub async fn handle_checkbio(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    let Some(target) = resolve_target(ctx, msg, arg).await? else {
        return reply_t(ctx, msg, lang, "admin.checkbio_usage", None).await;
    };

    let profile = match ctx.moderation.profiles().fetch_profile(target).await {
        Ok(profile) => profile,
        Err(e) => {
            return reply_t(
                ctx,
                msg,
                lang,
                "admin.checkbio_error",
                Some(&params([("user_id", target.to_string()), ("error", escape_html(&e.to_string()))])),
            )
            .await;
        }
    };

    let mut lines = vec![ctx.i18n.t(
        "admin.checkbio_header",
        lang,
        Some(&params([
            ("user_id", target.to_string()),
            (
                "username",
                escape_html(profile.username.as_deref().unwrap_or("none")),
            ),
        ])),
    )];
    match profile.bio.as_deref().map(str::trim).filter(|bio| !bio.is_empty()) {
        Some(bio) => lines.push(ctx.i18n.t("admin.checkbio_bio", lang, Some(&params([("bio", escape_html(bio))])))),
        None => lines.push(ctx.i18n.t("admin.checkbio_bio_blank", lang, None)),
    }
    match ctx.moderation.profiles().check_snapshot(&profile) {
        Some(violation) => lines.push(ctx.i18n.t(
            "admin.checkbio_problem",
            lang,
            Some(&params([
                ("field", violation.field.to_string()),
                ("issue_type", violation.issue.to_string()),
            ])),
        )),
        None => lines.push(ctx.i18n.t("admin.checkbio_clean", lang, None)),
    }

    reply(ctx, msg, &lines.join("\n")).await
}

/// Look up a channel by `@username` or numeric ID
async fn find_channel(ctx: &AppContext, identifier: &str) -> std::result::Result<ChatInfo, BotApiError> {
    match identifier.strip_prefix('@') {
        Some(username) => ctx.api.get_chat_by_username(username).await,
        None => match identifier.parse::<i64>() {
            Ok(id) => ctx.api.get_chat_info(id).await,
            Err(_) => Err(BotApiError::BadRequest(format!("'{}' is not a channel id", identifier))),
        },
    }
}

/// Handle /setchannel
pub async fn handle_setchannel(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    if arg.is_empty() {
        return reply_t(ctx, msg, lang, "admin.setchannel_usage", None).await;
    }
    if arg.eq_ignore_ascii_case("clear") {
        ctx.db.set_verification_channel(None).await?;
        log_admin_action(admin_id(msg), "setchannel", None, Some("cleared"));
        return reply_t(ctx, msg, lang, "admin.setchannel_cleared", None).await;
    }

    let channel = match find_channel(ctx, arg).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!(identifier = arg, error = %e, "Channel lookup failed");
            return reply_t(
                ctx,
                msg,
                lang,
                "admin.setchannel_error",
                Some(&params([("identifier", escape_html(arg)), ("error", escape_html(&e.to_string()))])),
            )
            .await;
        }
    };

    let bot_is_admin = ctx
        .api
        .get_chat_member(channel.id, ctx.bot.id)
        .await
        .map(|status| status.is_admin())
        .unwrap_or(false);
    if !bot_is_admin {
        return reply_t(ctx, msg, lang, "admin.setchannel_not_admin", None).await;
    }

    ctx.db.set_verification_channel(Some(channel.id)).await?;
    log_admin_action(admin_id(msg), "setchannel", Some(&channel.id.to_string()), channel.title.as_deref());

    let title = channel.title.clone().unwrap_or_else(|| channel.id.to_string());
    let mut text = ctx.i18n.t(
        "admin.setchannel_success",
        lang,
        Some(&params([("channel_title", escape_html(&title)), ("channel_id", channel.id.to_string())])),
    );
    match ctx.unmute.channel_link(channel.id).await {
        Some(link) => text.push_str(&ctx.i18n.t("admin.setchannel_invite", lang, Some(&params([("invite_link", link)])))),
        None => text.push_str(&ctx.i18n.t("admin.setchannel_no_invite", lang, None)),
    }
    reply(ctx, msg, &text).await
}

/// Handle /stats
pub async fn handle_stats(ctx: &AppContext, msg: &Message, lang: &str) -> Result<()> {
    let stats = ctx.db.get_statistics().await?;
    let caches = ctx.cache_sizes();
    let channel = match ctx.unmute.verification_channel().await? {
        Some(id) => id.to_string(),
        None => ctx.i18n.t("admin.not_set", lang, None),
    };
    let maintenance = ctx
        .i18n
        .t(if ctx.auth.maintenance() { "admin.on" } else { "admin.off" }, lang, None);
    let uptime = format_duration(ctx.uptime().num_seconds().max(1) as u64);

    reply_t(
        ctx,
        msg,
        lang,
        "admin.stats",
        Some(&params([
            ("groups_count", stats.groups.to_string()),
            ("total_users_count", stats.users.to_string()),
            ("started_users_count", stats.started_users.to_string()),
            ("bad_actors_count", stats.bad_actors.to_string()),
            ("actions_count", stats.actions_logged.to_string()),
            ("verification_channel_id", channel),
            ("maintenance_mode_status", maintenance),
            ("profile_cache_size", caches.profiles.to_string()),
            ("username_cache_size", caches.usernames.to_string()),
            ("broadcast_jobs", ctx.broadcasts.active_jobs().len().to_string()),
            ("uptime", uptime),
        ])),
    )
    .await
}

/// Handle /enable (`enabled`) and /disable
pub async fn handle_feature(ctx: &AppContext, msg: &Message, lang: &str, arg: &str, enabled: bool) -> Result<()> {
    let feature = arg.trim_start_matches('/').to_lowercase();
    if feature.is_empty() {
        let usage = if enabled { "admin.enable_usage" } else { "admin.disable_usage" };
        return reply_t(ctx, msg, lang, usage, None).await;
    }
    if !enabled && CRITICAL_FEATURES.contains(&feature.as_str()) {
        return reply_t(
            ctx,
            msg,
            lang,
            "admin.disable_critical",
            Some(&params([("feature_name", escape_html(&feature))])),
        )
        .await;
    }

    ctx.db.admin.set_feature(&feature, enabled).await?;
    log_admin_action(
        admin_id(msg),
        if enabled { "enable" } else { "disable" },
        Some(&feature),
        None,
    );

    let key = if enabled { "admin.enable_success" } else { "admin.disable_success" };
    reply_t(ctx, msg, lang, key, Some(&params([("feature_name", escape_html(&feature))]))).await
}

/// Handle /maintenance
pub async fn handle_maintenance(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    let on = match arg.to_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => {
            let current = ctx
                .i18n
                .t(if ctx.auth.maintenance() { "admin.on" } else { "admin.off" }, lang, None);
            return reply_t(
                ctx,
                msg,
                lang,
                "admin.maintenance_usage",
                Some(&params([("current_state", current)])),
            )
            .await;
        }
    };

    ctx.auth.switch_maintenance(on).await?;
    log_admin_action(admin_id(msg), "maintenance", None, Some(if on { "on" } else { "off" }));

    let state = ctx.i18n.t(if on { "admin.on" } else { "admin.off" }, lang, None);
    reply_t(ctx, msg, lang, "admin.maintenance_success", Some(&params([("state", state)]))).await
}

/// Handle /unmuteall
pub async fn handle_unmuteall(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    if arg.is_empty() {
        return reply_t(ctx, msg, lang, "unmuteall.usage", None).await;
    }
    let Ok(group_id) = arg.parse::<i64>() else {
        return reply_t(ctx, msg, lang, "unmuteall.invalid_group", None).await;
    };

    reply_t(ctx, msg, lang, "unmuteall.started", Some(&params([("group_id", group_id)]))).await?;
    let report = ctx.moderation.punishments().unmute_all(group_id).await?;
    log_admin_action(
        admin_id(msg),
        "unmuteall",
        Some(&group_id.to_string()),
        Some(&format!("unmuted={} failed={}", report.unmuted, report.failed)),
    );

    reply_t(
        ctx,
        msg,
        lang,
        "unmuteall.complete",
        Some(&params([
            ("group_id", group_id.to_string()),
            ("unmuted_count", report.unmuted.to_string()),
            ("failed_count", report.failed.to_string()),
            ("not_in_group_count", report.not_in_group.to_string()),
        ])),
    )
    .await
}

/// Handle /gunmuteall: unmute all over every known group
pub async fn handle_gunmuteall(ctx: &AppContext, msg: &Message, lang: &str) -> Result<()> {
    let groups = ctx.db.groups.list_ids().await?;
    if groups.is_empty() {
        return reply_t(ctx, msg, lang, "unmuteall.global_no_data", None).await;
    }

    reply_t(ctx, msg, lang, "unmuteall.global_started", None).await?;
    let mut total = UnmuteAllReport::default();
    for group_id in &groups {
        match ctx.moderation.punishments().unmute_all(*group_id).await {
            Ok(report) => {
                total.unmuted += report.unmuted;
                total.failed += report.failed;
                total.not_in_group += report.not_in_group;
            }
            Err(e) => {
                warn!(group_id, error = %e, "Unmute all failed for group");
                total.failed += 1;
            }
        }
    }
    info!(
        groups = groups.len(),
        unmuted = total.unmuted,
        failed = total.failed,
        not_in_group = total.not_in_group,
        "Global unmute all finished"
    );
    log_admin_action(
        admin_id(msg),
        "gunmuteall",
        None,
        Some(&format!(
            "unmuted={} failed={} not_in_group={}",
            total.unmuted, total.failed, total.not_in_group
        )),
    );

    reply_t(
        ctx,
        msg,
        lang,
        "unmuteall.global_complete",
        Some(&params([
            ("groups_count", groups.len()),
            ("total_unmuted", total.unmuted),
            ("total_failed", total.failed),
            ("total_not_in_group", total.not_in_group),
        ])),
    )
    .await
}
