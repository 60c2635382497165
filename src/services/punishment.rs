//! Action applier
//!
//! Applies mute, kick and ban through the Bot API, persists the bad actor
//! and action log rows and posts the notice. Every action is debounced per
//! (chat, user) so bursts of messages do not stack punishments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::database::DatabaseService;
use crate::middleware::cache::{DebounceKey, Debouncer};
use crate::models::{Group, PunishAction, TriggerType};
use crate::services::notification::{NotificationService, PunishmentNotice};
use crate::services::telegram::BotApi;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{ApiResult, BotApiError, Result};
use crate::utils::helpers::punishment_end;
use crate::utils::logging::{log_api_error, log_debounced, log_moderation_action};

/// Who is punished, and why
#[derive(Debug, Clone)]
pub struct PunishmentRequest {
    pub user_id: i64,
    pub user_name: String,
    pub trigger: TriggerType,
    pub reason: String,
    /// Message the notice replies to
    pub reply_to: Option<i32>,
}

/// Result of lifting restrictions across a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmuteAllReport {
    pub unmuted: usize,
    pub failed: usize,
    pub not_in_group: usize,
}

/// What happened to a punishment request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunishmentOutcome {
    Applied { action: PunishAction, duration_seconds: u64 },
    Debounced,
    /// The API refused the action; nothing was recorded
    Failed,
    /// The bot is no longer in the group, which was forgotten
    GroupGone,
}

#[derive(Debug, Clone)]
pub struct PunishmentService {
    api: Arc<dyn BotApi>,
    db: DatabaseService,
    notifier: NotificationService,
    debouncer: Debouncer,
    clock: SharedClock,
}

impl PunishmentService {
    pub fn new(
        api: Arc<dyn BotApi>,
        db: DatabaseService,
        notifier: NotificationService,
        debouncer: Debouncer,
        clock: SharedClock,
    ) -> Self {
        Self {
            api,
            db,
            notifier,
            debouncer,
            clock,
        }
    }

    /// Perform an action against a chat member. Kicks are a ban followed
    /// by an unban so the user can come back.
    pub async fn apply_action(
        &self,
        chat_id: i64,
        user_id: i64,
        action: PunishAction,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        match action {
            PunishAction::Mute => self.api.restrict_chat_member(chat_id, user_id, until).await,
            PunishAction::Ban => self.api.ban_chat_member(chat_id, user_id, until).await,
            PunishAction::Kick => {
                self.api.ban_chat_member(chat_id, user_id, None).await?;
                self.api.unban_chat_member(chat_id, user_id).await
            }
        }
    }

    /// Delete a message, ignoring failures
    pub async fn delete_message(&self, chat_id: i64, message_id: i32) -> bool {
        match self.api.delete_message(chat_id, message_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id, message_id, error = %e, "Could not delete message");
                false
            }
        }
    }

    async fn handle_api_failure(&self, group_id: i64, error: &BotApiError) -> Result<PunishmentOutcome> {
        log_api_error("punish", &error.to_string(), Some(&group_id.to_string()));
        if error.is_forbidden() {
            self.db.forget_group(group_id).await?;
            return Ok(PunishmentOutcome::GroupGone);
        }
        Ok(PunishmentOutcome::Failed)
    }

    /// Punish a sender or joining user with the group's configured action
    pub async fn punish(&self, group: &Group, request: &PunishmentRequest) -> Result<PunishmentOutcome> {
        let key = DebounceKey::sender(group.id, request.user_id);
        if !self.debouncer.try_acquire(key.clone()) {
            log_debounced(group.id, request.user_id, "sender");
            return Ok(PunishmentOutcome::Debounced);
        }

        let action = group.punish_action;
        let duration = group.duration_for(request.trigger);
        let now = self.clock.now();

        if let Err(e) = self
            .apply_action(group.id, request.user_id, action, punishment_end(now, duration))
            .await
        {
            self.debouncer.release(&key);
            return self.handle_api_failure(group.id, &e).await;
        }

        self.db
            .record_punishment(
                request.user_id,
                group.id,
                action,
                request.trigger,
                &request.reason,
                duration,
                now,
            )
            .await?;
        log_moderation_action(group.id, request.user_id, action.as_str(), request.trigger.as_str(), duration);

        let notice = PunishmentNotice {
            chat_id: group.id,
            user_id: request.user_id,
            user_name: request.user_name.clone(),
            action,
            duration_seconds: duration,
            reason: request.reason.clone(),
            reply_to: request.reply_to,
        };
        if let Err(e) = self.notifier.send_punishment_notice(&notice).await {
            warn!(chat_id = group.id, error = %e, "Punishment notice not sent");
        }

        Ok(PunishmentOutcome::Applied {
            action,
            duration_seconds: duration,
        })
    }

    /// Mute users mentioned with problematic profiles for the group's
    /// mention duration. Returns the users that were muted.
    pub async fn mute_mentioned(
        &self,
        group: &Group,
        sender_id: i64,
        sender_name: &str,
        mentioned: &[(i64, String)],
        reason: &str,
    ) -> Result<Vec<i64>> {
        let duration = group.duration_for(TriggerType::MentionProfile);
        let now = self.clock.now();
        let mut muted = Vec::new();
        let mut muted_names = Vec::new();

        for (user_id, name) in mentioned {
            let key = DebounceKey::mention(group.id, *user_id);
            if !self.debouncer.try_acquire(key.clone()) {
                log_debounced(group.id, *user_id, "mention");
                continue;
            }

            if let Err(e) = self
                .apply_action(group.id, *user_id, PunishAction::Mute, punishment_end(now, duration))
                .await
            {
                self.debouncer.release(&key);
                if let PunishmentOutcome::GroupGone = self.handle_api_failure(group.id, &e).await? {
                    return Ok(muted);
                }
                continue;
            }

            self.db
                .record_punishment(
                    *user_id,
                    group.id,
                    PunishAction::Mute,
                    TriggerType::MentionProfile,
                    reason,
                    duration,
                    now,
                )
                .await?;
            log_moderation_action(group.id, *user_id, "mute", TriggerType::MentionProfile.as_str(), duration);
            muted.push(*user_id);
            muted_names.push((*user_id, name.clone()));
        }

        if !muted_names.is_empty() {
            if let Err(e) = self
                .notifier
                .send_mention_notice(group.id, sender_id, sender_name, &muted_names, duration)
                .await
            {
                warn!(chat_id = group.id, error = %e, "Mention notice not sent");
            }
            info!(chat_id = group.id, sender_id, muted = muted.len(), "Muted mentioned users");
        }

        Ok(muted)
    }

    /// Lift a user's restrictions and clear their bad actor entry
    pub async fn lift(&self, chat_id: i64, user_id: i64) -> ApiResult<()> {
        self.api.lift_restrictions(chat_id, user_id).await?;
        if let Err(e) = self.db.moderation.delete_bad_actor(user_id, chat_id).await {
            warn!(chat_id, user_id, error = %e, "Could not clear bad actor entry");
        }
        self.debouncer.release(&DebounceKey::sender(chat_id, user_id));
        self.debouncer.release(&DebounceKey::mention(chat_id, user_id));
        Ok(())
    }

    /// Kick or ban every user currently muted in the group.
    /// Returns (applied, failed).
    pub async fn batch_apply(&self, group: &Group, action: PunishAction) -> Result<(usize, usize)> {
        let muted = self
            .db
            .moderation
            .bad_actors_in_group(group.id, Some(PunishAction::Mute))
            .await?;
        let now = self.clock.now();
        let (mut applied, mut failed) = (0, 0);

        for actor in muted {
            match self.apply_action(group.id, actor.user_id, action, None).await {
                Ok(()) => {
                    self.db
                        .record_punishment(
                            actor.user_id,
                            group.id,
                            action,
                            TriggerType::Profile,
                            &actor.reason,
                            0,
                            now,
                        )
                        .await?;
                    applied += 1;
                }
                Err(e) => {
                    warn!(chat_id = group.id, user_id = actor.user_id, error = %e, "Batch action failed");
                    failed += 1;
                    if e.is_forbidden() {
                        self.db.forget_group(group.id).await?;
                        break;
                    }
                }
            }
        }

        info!(chat_id = group.id, action = %action, applied, failed, "Batch operation finished");
        Ok((applied, failed))
    }

    /// Lift restrictions of every known user of a group
    pub async fn unmute_all(&self, group_id: i64) -> Result<UnmuteAllReport> {
        let mut user_ids = self.db.groups.member_ids(group_id).await?;
        for actor in self.db.moderation.bad_actors_in_group(group_id, None).await? {
            if !user_ids.contains(&actor.user_id) {
                user_ids.push(actor.user_id);
            }
        }

        let mut report = UnmuteAllReport::default();
        for user_id in user_ids {
            match self.api.get_chat_member(group_id, user_id).await {
                Ok(status) if !status.is_present() => {
                    report.not_in_group += 1;
                    continue;
                }
                Ok(_) => {}
                Err(BotApiError::Forbidden(_)) => {
                    report.failed += 1;
                    break;
                }
                Err(BotApiError::BadRequest(_)) => {
                    report.not_in_group += 1;
                    continue;
                }
                Err(e) => {
                    debug!(group_id, user_id, error = %e, "Member lookup failed");
                    report.failed += 1;
                    continue;
                }
            }

            match self.lift(group_id, user_id).await {
                Ok(()) => report.unmuted += 1,
                Err(e) => {
                    debug!(group_id, user_id, error = %e, "Unmute failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            group_id,
            unmuted = report.unmuted,
            failed = report.failed,
            not_in_group = report.not_in_group,
            "Unmute all finished"
        );
        Ok(report)
    }

    pub fn purge_expired(&self) -> usize {
        self.debouncer.purge_expired()
    }

    pub fn notifier(&self) -> &NotificationService {
        &self.notifier
    }
}
