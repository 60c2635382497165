//! Broadcast command handlers
//!
//! `/broadcast`, `/bcastall` and `/bcastself` take an optional interval
//! such as `30m` or `2h` in front of the text. With one, the broadcast is
//! persisted as a timed job instead of being sent once.

use teloxide::types::Message;

use crate::handlers::{reply_t, user_id};
use crate::i18n::params;
use crate::models::{BroadcastTarget, Button, Keyboard};
use crate::services::broadcast::{detect_html, new_job_name};
use crate::services::AppContext;
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_duration, parse_duration};
use crate::utils::logging::log_admin_action;

/// Arguments of a broadcast command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastArgs<'a> {
    pub target: Option<i64>,
    pub interval: Option<u64>,
    /// A duration-shaped token that is not a usable interval
    pub bad_interval: Option<&'a str>,
    pub text: &'a str,
}

/// First whitespace separated token and the untouched rest
fn split_first(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(index) => (&input[..index], input[index..].trim_start()),
        None => (input, ""),
    }
}

/// An interval needs a unit, so a bare number is never one
pub fn parse_interval(token: &str) -> Option<u64> {
    if token.is_empty() || token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    parse_duration(token).filter(|seconds| *seconds > 0)
}

/// `30m`, `1h30m`, `99999999w`: digits followed by duration units
fn looks_like_duration(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().all(|c| c.is_ascii_digit() || "wdhmsWDHMS".contains(c))
}

/// Parse `[target_id] [interval] <text>`; the target only when allowed
pub fn parse_broadcast_args(input: &str, allow_target: bool) -> BroadcastArgs<'_> {
    let mut rest = input.trim();
    let mut args = BroadcastArgs {
        target: None,
        interval: None,
        bad_interval: None,
        text: rest,
    };

    if allow_target {
        let (token, tail) = split_first(rest);
        if let Ok(id) = token.parse::<i64>() {
            args.target = Some(id);
            rest = tail;
        }
    }

    let (token, tail) = split_first(rest);
    if let Some(seconds) = parse_interval(token) {
        args.interval = Some(seconds);
        rest = tail;
    } else if looks_like_duration(token) {
        args.bad_interval = Some(token);
        rest = tail;
    }

    args.text = rest;
    args
}

fn admin_id(msg: &Message) -> i64 {
    msg.from.as_ref().map(user_id).unwrap_or_default()
}

async fn invalid_interval(ctx: &AppContext, msg: &Message, lang: &str, token: &str) -> Result<()> {
    reply_t(
        ctx,
        msg,
        lang,
        "broadcast.invalid_interval",
        Some(&params([("interval", escape_html(token))])),
    )
    .await
}

async fn schedule(
    ctx: &AppContext,
    msg: &Message,
    lang: &str,
    target: BroadcastTarget,
    text: String,
    interval: u64,
    keyboard: Option<&Keyboard>,
) -> Result<()> {
    let job = ctx
        .broadcasts
        .schedule(new_job_name("bcast"), target, text, interval, keyboard)
        .await?;
    log_admin_action(
        admin_id(msg),
        "schedule_broadcast",
        Some(&job.job_name),
        Some(&format!("target={} every {}s", target, interval)),
    );
    reply_t(
        ctx,
        msg,
        lang,
        "broadcast.scheduled",
        Some(&params([
            ("job_name", job.job_name),
            ("interval", format_duration(interval)),
        ])),
    )
    .await
}

/// Handle /broadcast
pub async fn handle_broadcast(ctx: &AppContext, msg: &Message, lang: &str, args: &str) -> Result<()> {
    if args.trim().is_empty() {
        return reply_t(ctx, msg, lang, "broadcast.usage", None).await;
    }
    let parsed = parse_broadcast_args(args, true);
    if let Some(token) = parsed.bad_interval {
        return invalid_interval(ctx, msg, lang, token).await;
    }
    if parsed.text.is_empty() {
        return reply_t(ctx, msg, lang, "broadcast.no_message", None).await;
    }
    let target = parsed.target.map(BroadcastTarget::Chat).unwrap_or(BroadcastTarget::Groups);

    if let Some(interval) = parsed.interval {
        return schedule(ctx, msg, lang, target, parsed.text.to_string(), interval, None).await;
    }

    let format = if detect_html(parsed.text) { "HTML" } else { "plain text" };
    reply_t(ctx, msg, lang, "broadcast.started", Some(&params([("format", format)]))).await?;

    let report = ctx.broadcasts.broadcast(target, parsed.text, None).await?;
    log_admin_action(admin_id(msg), "broadcast", Some(&target.to_string()), None);
    reply_t(
        ctx,
        msg,
        lang,
        "broadcast.complete",
        Some(&params([("sent_count", report.sent()), ("failed_count", report.failed())])),
    )
    .await
}

/// Handle /bcastall
pub async fn handle_bcastall(ctx: &AppContext, msg: &Message, lang: &str, args: &str) -> Result<()> {
    let parsed = parse_broadcast_args(args, false);
    if let Some(token) = parsed.bad_interval {
        return invalid_interval(ctx, msg, lang, token).await;
    }
    if parsed.text.is_empty() {
        return reply_t(ctx, msg, lang, "broadcast.bcastall_usage", None).await;
    }

    if let Some(interval) = parsed.interval {
        return schedule(ctx, msg, lang, BroadcastTarget::Everyone, parsed.text.to_string(), interval, None).await;
    }

    reply_t(ctx, msg, lang, "broadcast.bcastall_started", None).await?;
    let report = ctx.broadcasts.broadcast(BroadcastTarget::Everyone, parsed.text, None).await?;
    log_admin_action(admin_id(msg), "bcastall", None, None);
    reply_t(
        ctx,
        msg,
        lang,
        "broadcast.bcastall_complete",
        Some(&params([
            ("sent_groups", report.groups.sent),
            ("failed_groups", report.groups.failed),
            ("sent_users", report.users.sent),
            ("failed_users", report.users.failed),
        ])),
    )
    .await
}

/// Handle /bcastself: promote the bot to every user who started it
pub async fn handle_bcastself(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    let interval = if arg.is_empty() {
        None
    } else {
        match parse_interval(arg) {
            Some(seconds) => Some(seconds),
            None => return reply_t(ctx, msg, lang, "broadcast.bcastself_usage", None).await,
        }
    };

    let bot_username = params([("bot_username", ctx.bot.username.as_str())]);
    let text = ctx.i18n.t("broadcast.bcastself_template", lang, Some(&bot_username));
    let keyboard = Keyboard::single(Button::url(
        ctx.i18n.t("start.add_to_group_button", lang, Some(&bot_username)),
        format!("https://t.me/{}?startgroup=true", ctx.bot.username),
    ));

    if let Some(interval) = interval {
        return schedule(ctx, msg, lang, BroadcastTarget::Users, text, interval, Some(&keyboard)).await;
    }

    reply_t(ctx, msg, lang, "broadcast.bcastself_started", None).await?;
    let report = ctx
        .broadcasts
        .broadcast(BroadcastTarget::Users, &text, Some(&keyboard))
        .await?;
    log_admin_action(admin_id(msg), "bcastself", None, None);
    reply_t(
        ctx,
        msg,
        lang,
        "broadcast.bcastself_complete",
        Some(&params([("sent_count", report.users.sent), ("failed_count", report.users.failed)])),
    )
    .await
}

/// Handle /stopbroadcast
pub async fn handle_stopbroadcast(ctx: &AppContext, msg: &Message, lang: &str, arg: &str) -> Result<()> {
    if arg.is_empty() {
        let jobs = ctx.broadcasts.active_jobs();
        if jobs.is_empty() {
            return reply_t(ctx, msg, lang, "broadcast.stop_none_active", None).await;
        }
        let list = jobs
            .iter()
            .map(|name| format!("<code>{}</code>", escape_html(name)))
            .collect::<Vec<_>>()
            .join("\n");
        return reply_t(ctx, msg, lang, "broadcast.stop_usage", Some(&params([("jobs", list)]))).await;
    }

    let job_name = escape_html(arg);
    if ctx.broadcasts.stop(arg).await? {
        log_admin_action(admin_id(msg), "stopbroadcast", Some(arg), None);
        reply_t(ctx, msg, lang, "broadcast.stop_success", Some(&params([("job_name", job_name)]))).await
    } else {
        reply_t(ctx, msg, lang, "broadcast.stop_not_found", Some(&params([("job_name", job_name)]))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("30m"), Some(1800));
        assert_eq!(parse_interval("2h"), Some(7200));
        assert_eq!(parse_interval("120"), None);
        assert_eq!(parse_interval("hello"), None);
        assert_eq!(parse_interval("permanent"), None);
    }

    #[test]
    fn test_parse_broadcast_args() {
        assert_eq!(
            parse_broadcast_args("-1001234 1h <b>Hear ye</b>\nsecond line", true),
            BroadcastArgs {
                target: Some(-1001234),
                interval: Some(3600),
                bad_interval: None,
                text: "<b>Hear ye</b>\nsecond line",
            }
        );
        assert_eq!(
            parse_broadcast_args("Hello everyone", true),
            BroadcastArgs {
                target: None,
                interval: None,
                bad_interval: None,
                text: "Hello everyone",
            }
        );
        // numbers are only targets where a target is accepted
        assert_eq!(
            parse_broadcast_args("42 knights ride", false),
            BroadcastArgs {
                target: None,
                interval: None,
                bad_interval: None,
                text: "42 knights ride",
            }
        );
        assert_eq!(parse_broadcast_args("12345", true).text, "");
    }

    #[test]
    fn test_oversized_interval_is_flagged_not_broadcast() {
        let parsed = parse_broadcast_args("9999999999999w Reminder", true);
        assert_eq!(parsed.interval, None);
        assert_eq!(parsed.bad_interval, Some("9999999999999w"));
        assert_eq!(parsed.text, "Reminder");

        assert_eq!(parse_interval("99999999w"), None);
        assert!(!looks_like_duration("hello"));
        assert!(!looks_like_duration("120"));
    }
}
