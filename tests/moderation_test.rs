//! Moderation pipeline scenarios against the fake Bot API

mod helpers;

use assert_matches::assert_matches;
use chrono::Duration;
use serial_test::serial;

use BardSentinel::handlers::handle_message;
use BardSentinel::models::{Group, IssueType, PunishAction, TriggerType, UpdateGroupPunishment};
use BardSentinel::services::{MemberStatus, PunishmentOutcome};
use helpers::*;

const MORDRED: i64 = 42;
const GAWAIN: i64 = 77;

#[tokio::test]
#[serial]
async fn test_link_message_is_deleted_and_sender_muted() {
    let t = TestContext::new().await;
    let group = t.group().await;
    let now = t.now();

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "join my group t.me/coolgroup123"))
        .await
        .expect("moderation failed");

    assert!(outcome.message_deleted);
    assert!(outcome.sender_punished);
    assert_eq!(outcome.decision.trigger, Some(TriggerType::Message));

    let calls = t.bot.calls();
    assert!(calls.contains(&ApiCall::Delete { chat_id: GROUP_ID, message_id: 10 }));
    assert!(calls.contains(&ApiCall::Restrict {
        chat_id: GROUP_ID,
        user_id: MORDRED,
        until: Some(now + Duration::hours(1)),
    }));
    assert_eq!(t.bot.sent_to(GROUP_ID).len(), 1, "one punishment notice");

    let actor = t
        .ctx
        .db
        .moderation
        .find_bad_actor(MORDRED, GROUP_ID)
        .await
        .unwrap()
        .expect("bad actor recorded");
    assert_eq!(actor.punishment_type, PunishAction::Mute);
    assert_eq!(actor.punishment_end, Some(now + Duration::hours(1)));

    assert_eq!(t.ctx.db.moderation.count_action_log().await.unwrap(), 1);
    let log = t.ctx.db.moderation.action_log_for_user(MORDRED).await.unwrap();
    assert_eq!(log[0].trigger_type, TriggerType::Message);
    assert_eq!(log[0].duration_seconds, 3600);
}

#[tokio::test]
#[serial]
async fn test_repeat_offence_inside_debounce_window_is_not_punished_twice() {
    let t = TestContext::new().await;
    let group = t.group().await;

    for message_id in [10, 11] {
        t.ctx
            .moderation
            .moderate_message(&group, &incoming(MORDRED, "Mordred", message_id, "buy at t.me/coolgroup123"))
            .await
            .unwrap();
    }

    let deletes = t
        .bot
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ApiCall::Delete { .. }))
        .count();
    assert_eq!(deletes, 2, "every offending message is deleted");
    assert_eq!(t.ctx.db.moderation.count_action_log().await.unwrap(), 1);
    assert_eq!(t.bot.sent_to(GROUP_ID).len(), 1);
}

#[tokio::test]
#[serial]
async fn test_clean_message_is_left_alone() {
    let t = TestContext::new().await;
    let group = t.group().await;

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "good morning everyone"))
        .await
        .unwrap();

    assert!(outcome.decision.is_clean());
    assert!(!outcome.message_deleted);
    assert!(t.bot.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn test_whitelisted_phrase_is_not_flagged() {
    let t = TestContext::new().await;
    let group = t.group().await;

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "studying biology all night"))
        .await
        .unwrap();

    assert!(outcome.decision.is_clean());
    assert!(t.bot.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn test_sender_profile_uses_profile_duration() {
    let t = TestContext::new().await;
    let group = t.group().await;
    t.bot.set_profile(spam_profile(MORDRED, "Mordred"));

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "hello there"))
        .await
        .unwrap();

    assert_eq!(outcome.decision.trigger, Some(TriggerType::Profile));
    assert!(outcome.decision.sender_violation.is_some());
    // profile duration defaults to 0: restricted forever
    assert!(t.bot.calls().contains(&ApiCall::Restrict {
        chat_id: GROUP_ID,
        user_id: MORDRED,
        until: None,
    }));
    let actor = t.ctx.db.moderation.find_bad_actor(MORDRED, GROUP_ID).await.unwrap().unwrap();
    assert_eq!(actor.punishment_end, None);
}

#[tokio::test]
#[serial]
async fn test_mentioned_user_with_bad_profile_is_muted_instead_of_sender() {
    let t = TestContext::new().await;
    let group = t.group().await;
    t.known_user(GAWAIN, Some("spammer_user"), "Gawain", false).await;
    t.bot.set_profile(spam_profile(GAWAIN, "Gawain"));

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "ask @spammer_user about it"))
        .await
        .unwrap();

    assert!(outcome.decision.mentions_only());
    assert!(outcome.message_deleted);
    assert!(!outcome.sender_punished);
    assert_eq!(outcome.mentioned_muted, vec![GAWAIN]);
    assert!(t.bot.calls().contains(&ApiCall::Restrict {
        chat_id: GROUP_ID,
        user_id: GAWAIN,
        until: None,
    }));
    assert!(t.ctx.db.moderation.find_bad_actor(MORDRED, GROUP_ID).await.unwrap().is_none());
    let log = t.ctx.db.moderation.action_log_for_user(GAWAIN).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].trigger_type, TriggerType::MentionProfile);
}

#[tokio::test]
#[serial]
async fn test_bad_actor_entry_expires_lazily() {
    let t = TestContext::new().await;
    t.group().await;
    t.ctx
        .db
        .record_punishment(MORDRED, GROUP_ID, PunishAction::Mute, TriggerType::Message, "link", 60, t.now())
        .await
        .unwrap();

    assert!(t.ctx.db.is_bad_actor(MORDRED, GROUP_ID, t.now()).await.unwrap());

    t.advance(61);
    assert!(!t.ctx.db.is_bad_actor(MORDRED, GROUP_ID, t.now()).await.unwrap());
    assert!(t.ctx.db.moderation.find_bad_actor(MORDRED, GROUP_ID).await.unwrap().is_none());
    // the audit trail stays
    assert_eq!(t.ctx.db.moderation.count_action_log().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_new_member_with_bad_profile_is_punished() {
    let t = TestContext::new().await;
    let group = t.group().await;
    t.bot.set_profile(spam_profile(GAWAIN, "Gawain"));

    let outcome = t
        .ctx
        .moderation
        .moderate_new_member(&group, &profile(GAWAIN, "Gawain"))
        .await
        .unwrap();

    assert_matches!(outcome, Some(PunishmentOutcome::Applied { action: PunishAction::Mute, .. }));
    let log = t.ctx.db.moderation.action_log_for_user(GAWAIN).await.unwrap();
    assert_eq!(log[0].trigger_type, TriggerType::Profile);
}

#[tokio::test]
#[serial]
async fn test_kicked_bot_forgets_the_group() {
    let t = TestContext::new().await;
    let group = t.group().await;
    t.bot.forbid(GROUP_ID);

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "join t.me/coolgroup123"))
        .await
        .unwrap();

    assert!(!outcome.sender_punished);
    assert!(t.ctx.db.groups.find_by_id(GROUP_ID).await.unwrap().is_none());
    assert_eq!(t.ctx.db.moderation.count_action_log().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_group_message_handler_moderates_members() {
    let t = TestContext::new().await;

    handle_message(&t.ctx, &group_message(MORDRED, "Mordred", 10, "join t.me/coolgroup123"))
        .await
        .unwrap();

    assert!(t.bot.calls().contains(&ApiCall::Delete { chat_id: GROUP_ID, message_id: 10 }));
    assert!(t.ctx.db.groups.find_by_id(GROUP_ID).await.unwrap().is_some());
    assert!(t.ctx.db.users.find_by_id(MORDRED).await.unwrap().is_some());
    assert!(t.ctx.db.groups.member_ids(GROUP_ID).await.unwrap().contains(&MORDRED));
}

#[tokio::test]
#[serial]
async fn test_admins_and_exempt_users_are_skipped() {
    let t = TestContext::new().await;
    t.group().await;

    t.bot.set_member(GROUP_ID, MORDRED, MemberStatus::Administrator);
    handle_message(&t.ctx, &group_message(MORDRED, "Mordred", 10, "join t.me/coolgroup123"))
        .await
        .unwrap();

    t.ctx
        .auth
        .set_group_exemption(GROUP_ID, GAWAIN, true, t.now())
        .await
        .unwrap();
    handle_message(&t.ctx, &group_message(GAWAIN, "Gawain", 11, "join t.me/coolgroup123"))
        .await
        .unwrap();

    assert!(t.bot.calls().is_empty());

    t.ctx
        .auth
        .set_group_exemption(GROUP_ID, GAWAIN, false, t.now())
        .await
        .unwrap();
    handle_message(&t.ctx, &group_message(GAWAIN, "Gawain", 12, "join t.me/coolgroup123"))
        .await
        .unwrap();
    assert!(t.bot.calls().contains(&ApiCall::Delete { chat_id: GROUP_ID, message_id: 12 }));
}

#[tokio::test]
#[serial]
async fn test_maintenance_mode_pauses_moderation() {
    let t = TestContext::new().await;
    t.ctx.auth.switch_maintenance(true).await.unwrap();

    handle_message(&t.ctx, &group_message(MORDRED, "Mordred", 10, "join t.me/coolgroup123"))
        .await
        .unwrap();
    assert!(t.bot.calls().is_empty());

    t.ctx.auth.switch_maintenance(false).await.unwrap();
    handle_message(&t.ctx, &group_message(MORDRED, "Mordred", 11, "join t.me/coolgroup123"))
        .await
        .unwrap();
    assert!(!t.bot.calls().is_empty());
}

async fn group_with_action(t: &TestContext, action: PunishAction) -> Group {
    t.group().await;
    t.ctx
        .db
        .groups
        .update_punishment(
            GROUP_ID,
            UpdateGroupPunishment {
                action: Some(action),
                ..UpdateGroupPunishment::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_kick_bans_then_unbans_and_lets_the_user_return() {
    let t = TestContext::new().await;
    let group = group_with_action(&t, PunishAction::Kick).await;
    let now = t.now();

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "join my group t.me/coolgroup123"))
        .await
        .unwrap();
    assert!(outcome.sender_punished);

    let sanctions: Vec<ApiCall> = t
        .bot
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ApiCall::Ban { .. } | ApiCall::Unban { .. }))
        .collect();
    assert_eq!(
        sanctions,
        vec![
            ApiCall::Ban { chat_id: GROUP_ID, user_id: MORDRED, until: None },
            ApiCall::Unban { chat_id: GROUP_ID, user_id: MORDRED },
        ]
    );
    let actor = t.ctx.db.moderation.find_bad_actor(MORDRED, GROUP_ID).await.unwrap().unwrap();
    assert_eq!(actor.punishment_type, PunishAction::Kick);
    assert_eq!(actor.punishment_end, Some(now));

    // the user rejoins a day later and behaves
    t.advance(86_400);
    t.bot.clear_calls();
    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 11, "hello everyone"))
        .await
        .unwrap();

    assert!(outcome.decision.is_clean());
    assert!(!outcome.decision.sender_is_bad_actor);
    assert!(t.bot.calls().is_empty());
    assert_eq!(t.ctx.db.moderation.count_action_log().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_timed_ban_stores_its_end() {
    let t = TestContext::new().await;
    let group = group_with_action(&t, PunishAction::Ban).await;
    let now = t.now();

    t.ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "join t.me/coolgroup123"))
        .await
        .unwrap();

    let calls = t.bot.calls();
    assert!(calls.contains(&ApiCall::Ban {
        chat_id: GROUP_ID,
        user_id: MORDRED,
        until: Some(now + Duration::hours(1)),
    }));
    assert!(!calls.iter().any(|call| matches!(call, ApiCall::Unban { .. })));
    let actor = t.ctx.db.moderation.find_bad_actor(MORDRED, GROUP_ID).await.unwrap().unwrap();
    assert_eq!(actor.punishment_type, PunishAction::Ban);
    assert_eq!(actor.punishment_end, Some(now + Duration::hours(1)));
}

#[tokio::test]
#[serial]
async fn test_out_of_range_stored_duration_punishes_permanently() {
    let t = TestContext::new().await;
    t.group().await;
    let group = t
        .ctx
        .db
        .groups
        .update_punishment(GROUP_ID, UpdateGroupPunishment::all_durations(i64::MAX as u64))
        .await
        .unwrap();

    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, "join my group t.me/coolgroup123"))
        .await
        .unwrap();

    assert!(outcome.sender_punished);
    assert!(t.bot.calls().contains(&ApiCall::Restrict {
        chat_id: GROUP_ID,
        user_id: MORDRED,
        until: None,
    }));
    let actor = t.ctx.db.moderation.find_bad_actor(MORDRED, GROUP_ID).await.unwrap().unwrap();
    assert_eq!(actor.punishment_end, None);
}

#[tokio::test]
#[serial]
async fn test_too_many_mentions_flag_the_message() {
    let t = TestContext::new().await;
    let group = t.group().await;

    let five = "@percival @tristan @bedivere @lamorak @gareth_k";
    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 10, five))
        .await
        .unwrap();
    assert!(outcome.decision.is_clean());

    let six = format!("{} @kay_knight", five);
    let outcome = t
        .ctx
        .moderation
        .moderate_message(&group, &incoming(MORDRED, "Mordred", 11, &six))
        .await
        .unwrap();

    assert_eq!(outcome.decision.message_issue, Some(IssueType::ExcessiveMentions));
    assert_eq!(outcome.decision.trigger, Some(TriggerType::Message));
    assert!(outcome.message_deleted);
    assert!(outcome.sender_punished);
    let log = t.ctx.db.moderation.action_log_for_user(MORDRED).await.unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_batch_kick_removes_every_muted_user() {
    let t = TestContext::new().await;
    let group = t.group().await;
    for user_id in [MORDRED, GAWAIN] {
        t.ctx
            .db
            .record_punishment(user_id, GROUP_ID, PunishAction::Mute, TriggerType::Profile, "bio", 0, t.now())
            .await
            .unwrap();
    }

    let (applied, failed) = t
        .ctx
        .moderation
        .punishments()
        .batch_apply(&group, PunishAction::Kick)
        .await
        .unwrap();

    assert_eq!((applied, failed), (2, 0));
    let calls = t.bot.calls();
    for user_id in [MORDRED, GAWAIN] {
        let ban = calls
            .iter()
            .position(|call| *call == ApiCall::Ban { chat_id: GROUP_ID, user_id, until: None })
            .expect("banned");
        let unban = calls
            .iter()
            .position(|call| *call == ApiCall::Unban { chat_id: GROUP_ID, user_id })
            .expect("unbanned");
        assert!(ban < unban);
        assert!(!t.ctx.db.is_bad_actor(user_id, GROUP_ID, t.now()).await.unwrap());
    }
    assert_eq!(t.ctx.db.moderation.count_action_log().await.unwrap(), 4);
    assert!(t
        .ctx
        .db
        .moderation
        .bad_actors_in_group(GROUP_ID, Some(PunishAction::Mute))
        .await
        .unwrap()
        .is_empty());
}
