//! Broadcasts, forbidden-chat cleanup and timed jobs

mod helpers;

use assert_matches::assert_matches;
use serial_test::serial;

use BardSentinel::handlers::{handle_command, Command};
use BardSentinel::models::{BroadcastTarget, TimedBroadcast};
use BardSentinel::utils::helpers::MAX_DURATION_SECONDS;
use BardSentinel::SentinelError;
use helpers::*;

const OTHER_GROUP: i64 = -100_456;
const GONE_GROUP: i64 = -100_789;

async fn three_groups(t: &TestContext) {
    t.group().await;
    t.ctx.ensure_group(OTHER_GROUP, Some("Camelot")).await.unwrap();
    t.ctx.ensure_group(GONE_GROUP, Some("Avalon")).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_group_broadcast_forgets_forbidden_groups() {
    let t = TestContext::new().await;
    three_groups(&t).await;
    t.bot.forbid(GONE_GROUP);

    let report = t
        .ctx
        .broadcasts
        .broadcast(BroadcastTarget::Groups, "Hear ye, hear ye", None)
        .await
        .unwrap();

    assert_eq!(report.groups.sent, 2);
    assert_eq!(report.groups.failed, 1);
    assert_eq!(report.groups.forbidden, vec![GONE_GROUP]);
    assert_eq!(report.users.sent, 0);
    assert!(t.ctx.db.groups.find_by_id(GONE_GROUP).await.unwrap().is_none());
    assert_eq!(t.bot.sent_to(OTHER_GROUP), vec!["Hear ye, hear ye".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_user_broadcast_reaches_started_users_only() {
    let t = TestContext::new().await;
    t.known_user(10, Some("lancelot"), "Lancelot", true).await;
    t.known_user(11, Some("galahad"), "Galahad", true).await;
    t.known_user(12, Some("bors"), "Bors", false).await;
    t.bot.forbid(11);

    let report = t
        .ctx
        .broadcasts
        .broadcast(BroadcastTarget::Users, "A quest awaits", None)
        .await
        .unwrap();

    assert_eq!(report.sent(), 1);
    assert_eq!(report.failed(), 1);
    assert!(t.bot.sent_to(12).is_empty());
    // blocked the bot, so no longer counted as started
    assert_eq!(t.ctx.db.users.started_user_ids().await.unwrap(), vec![10]);
}

#[tokio::test]
#[serial]
async fn test_everyone_and_single_chat_targets() {
    let t = TestContext::new().await;
    three_groups(&t).await;
    t.known_user(10, Some("lancelot"), "Lancelot", true).await;

    let report = t
        .ctx
        .broadcasts
        .broadcast(BroadcastTarget::Everyone, "<b>News</b>", None)
        .await
        .unwrap();
    assert_eq!(report.groups.sent, 3);
    assert_eq!(report.users.sent, 1);

    t.bot.clear_calls();
    let report = t
        .ctx
        .broadcasts
        .broadcast(BroadcastTarget::Chat(10), "Just for you", None)
        .await
        .unwrap();
    assert_eq!(report.users.sent, 1);
    assert_eq!(report.groups.sent, 0);
    assert_eq!(t.bot.sent_to(10), vec!["Just for you".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_timed_broadcast_lifecycle() {
    let t = TestContext::new().await;

    let invalid = t
        .ctx
        .broadcasts
        .schedule("bcast_zero".to_string(), BroadcastTarget::Groups, "tick".to_string(), 0, None)
        .await;
    assert_matches!(invalid, Err(SentinelError::InvalidInput(_)));

    let too_long = t
        .ctx
        .broadcasts
        .schedule(
            "bcast_forever".to_string(),
            BroadcastTarget::Groups,
            "tick".to_string(),
            MAX_DURATION_SECONDS + 1,
            None,
        )
        .await;
    assert_matches!(too_long, Err(SentinelError::InvalidInput(_)));
    assert!(t.ctx.db.admin.list_timed_broadcasts().await.unwrap().is_empty());

    let job = t
        .ctx
        .broadcasts
        .schedule("bcast_hourly".to_string(), BroadcastTarget::Groups, "tick".to_string(), 3600, None)
        .await
        .unwrap();
    assert_eq!(job.next_run_at, t.now() + chrono::Duration::hours(1));
    assert_eq!(t.ctx.broadcasts.active_jobs(), vec!["bcast_hourly".to_string()]);
    assert_eq!(t.ctx.db.admin.list_timed_broadcasts().await.unwrap().len(), 1);

    assert!(t.ctx.broadcasts.stop("bcast_hourly").await.unwrap());
    assert!(t.ctx.broadcasts.active_jobs().is_empty());
    assert!(t.ctx.db.admin.list_timed_broadcasts().await.unwrap().is_empty());
    assert!(!t.ctx.broadcasts.stop("bcast_hourly").await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_restore_drops_malformed_jobs() {
    let t = TestContext::new().await;
    let job = |name: &str, target: &str, interval: i64| TimedBroadcast {
        job_name: name.to_string(),
        target_type: target.to_string(),
        message_text: "tick".to_string(),
        interval_seconds: interval,
        next_run_at: t.now() + chrono::Duration::hours(1),
        markup_json: None,
    };
    t.ctx.db.admin.upsert_timed_broadcast(&job("bcast_good", "groups", 3600)).await.unwrap();
    t.ctx.db.admin.upsert_timed_broadcast(&job("bcast_bad_target", "dragons", 3600)).await.unwrap();
    t.ctx.db.admin.upsert_timed_broadcast(&job("bcast_bad_interval", "users", 0)).await.unwrap();

    let restored = t.ctx.broadcasts.restore_jobs().await.unwrap();

    assert_eq!(restored, 1);
    assert_eq!(t.ctx.broadcasts.active_jobs(), vec!["bcast_good".to_string()]);
    let names: Vec<String> = t
        .ctx
        .db
        .admin
        .list_timed_broadcasts()
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.job_name)
        .collect();
    assert_eq!(names, vec!["bcast_good".to_string()]);
    t.ctx.broadcasts.shutdown();
}

#[tokio::test]
#[serial]
async fn test_broadcast_command_sends_to_groups() {
    let t = TestContext::new().await;
    three_groups(&t).await;

    let msg = private_message(SUPER_ADMIN, "Merlin", "/broadcast The tournament begins");
    handle_command(&t.ctx, &msg, Command::Broadcast("The tournament begins".to_string()))
        .await
        .unwrap();

    assert_eq!(t.bot.sent_to(OTHER_GROUP), vec!["The tournament begins".to_string()]);
    // "started" and "complete" replies to the admin
    assert_eq!(t.bot.sent_to(SUPER_ADMIN).len(), 2);
}

#[tokio::test]
#[serial]
async fn test_broadcast_command_with_interval_schedules_a_job() {
    let t = TestContext::new().await;
    three_groups(&t).await;

    let msg = private_message(SUPER_ADMIN, "Merlin", "/broadcast 2h Reminder");
    handle_command(&t.ctx, &msg, Command::Broadcast("2h Reminder".to_string()))
        .await
        .unwrap();

    let jobs = t.ctx.db.admin.list_timed_broadcasts().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].interval_seconds, 7200);
    assert_eq!(jobs[0].message_text, "Reminder");
    assert!(t.bot.sent_to(OTHER_GROUP).is_empty());
    t.ctx.broadcasts.shutdown();
}

#[tokio::test]
#[serial]
async fn test_broadcast_command_rejects_oversized_interval() {
    let t = TestContext::new().await;
    three_groups(&t).await;

    let msg = private_message(SUPER_ADMIN, "Merlin", "/broadcast 9999999999999w Reminder");
    handle_command(&t.ctx, &msg, Command::Broadcast("9999999999999w Reminder".to_string()))
        .await
        .unwrap();

    assert!(t.ctx.db.admin.list_timed_broadcasts().await.unwrap().is_empty());
    assert!(t.bot.sent_to(OTHER_GROUP).is_empty());
    let expected = t.ctx.i18n.t(
        "broadcast.invalid_interval",
        "en",
        Some(&BardSentinel::i18n::params([("interval", "9999999999999w")])),
    );
    assert_eq!(t.bot.sent_to(SUPER_ADMIN), vec![expected]);
}
