//! Database service layer
//!
//! This module provides a high-level interface to database operations

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::GroupDefaults;
use crate::database::{
    AdminRepository, DatabasePool, GroupRepository, ModerationRepository, NewActionLog,
    UserRepository,
};
use crate::models::*;
use crate::utils::errors::SentinelError;
use crate::utils::helpers::punishment_end;

/// Key of the runtime verification channel in `bot_settings`
pub const CHANNEL_SETTING_KEY: &str = "verification_channel_id";

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BotStatistics {
    pub groups: i64,
    pub users: i64,
    pub started_users: i64,
    pub bad_actors: i64,
    pub actions_logged: i64,
}

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub users: UserRepository,
    pub groups: GroupRepository,
    pub moderation: ModerationRepository,
    pub admin: AdminRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            groups: GroupRepository::new(pool.clone()),
            moderation: ModerationRepository::new(pool.clone()),
            admin: AdminRepository::new(pool),
        }
    }

    /// Make sure a group row exists, creating it with configured defaults
    pub async fn ensure_group(
        &self,
        group_id: i64,
        name: Option<&str>,
        defaults: &GroupDefaults,
        now: DateTime<Utc>,
    ) -> Result<Group, SentinelError> {
        self.groups.upsert(group_id, name, defaults, now).await
    }

    /// Remove a group the bot left or was removed from
    pub async fn forget_group(&self, group_id: i64) -> Result<bool, SentinelError> {
        let removed = self.groups.delete(group_id).await?;
        if removed {
            tracing::info!(group_id, "Group removed from database");
        }
        Ok(removed)
    }

    /// Active bad actor entry of a user in a group. Expired entries are
    /// deleted on lookup.
    pub async fn active_bad_actor(
        &self,
        user_id: i64,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<BadActor>, SentinelError> {
        match self.moderation.find_bad_actor(user_id, group_id).await? {
            Some(actor) if actor.is_expired(now) => {
                self.moderation.delete_bad_actor(user_id, group_id).await?;
                tracing::debug!(user_id, group_id, "Expired bad actor entry removed");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn is_bad_actor(
        &self,
        user_id: i64,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, SentinelError> {
        Ok(self.active_bad_actor(user_id, group_id, now).await?.is_some())
    }

    /// Persist a punitive action: one bad actor row and one action log row.
    /// A kick row expires at once so a returning user starts clean.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_punishment(
        &self,
        user_id: i64,
        group_id: i64,
        action: PunishAction,
        trigger: TriggerType,
        reason: &str,
        duration_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<BadActor, SentinelError> {
        let end = match action {
            PunishAction::Kick => Some(now),
            PunishAction::Mute | PunishAction::Ban => punishment_end(now, duration_seconds),
        };

        let actor = self
            .moderation
            .upsert_bad_actor(user_id, group_id, reason, action, end, now)
            .await?;

        self.moderation
            .insert_action_log(
                NewActionLog {
                    user_id,
                    group_id,
                    action,
                    trigger_type: trigger,
                    reason,
                    duration_seconds,
                },
                now,
            )
            .await?;

        Ok(actor)
    }

    /// Verification channel set at runtime, if any
    pub async fn verification_channel(&self) -> Result<Option<i64>, SentinelError> {
        Ok(self
            .admin
            .get_setting(CHANNEL_SETTING_KEY)
            .await?
            .and_then(|value| value.parse().ok()))
    }

    pub async fn set_verification_channel(&self, channel: Option<i64>) -> Result<(), SentinelError> {
        match channel {
            Some(id) => {
                self.admin
                    .set_setting(CHANNEL_SETTING_KEY, &id.to_string())
                    .await
            }
            None => self.admin.delete_setting(CHANNEL_SETTING_KEY).await.map(|_| ()),
        }
    }

    /// Get bot statistics
    pub async fn get_statistics(&self) -> Result<BotStatistics, SentinelError> {
        Ok(BotStatistics {
            groups: self.groups.count().await?,
            users: self.users.count().await?,
            started_users: self.users.count_started().await?,
            bad_actors: self.moderation.count_bad_actors().await?,
            actions_logged: self.moderation.count_action_log().await?,
        })
    }

    /// Clean up expired data
    pub async fn cleanup_expired_data(&self, now: DateTime<Utc>) -> Result<u64, SentinelError> {
        self.moderation.delete_expired_bad_actors(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_pool, run_migrations, DatabaseConfig};
    use chrono::Duration;

    async fn service() -> DatabaseService {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        DatabaseService::new(pool)
    }

    fn defaults() -> GroupDefaults {
        GroupDefaults {
            action: PunishAction::Mute,
            duration_profile: 0,
            duration_message: 3600,
            duration_mention: 0,
        }
    }

    #[tokio::test]
    async fn test_expired_bad_actor_is_removed_on_lookup() {
        let db = service().await;
        let now = Utc::now();
        db.ensure_group(-100, Some("g"), &defaults(), now).await.unwrap();

        db.record_punishment(7, -100, PunishAction::Mute, TriggerType::Message, "spam", 60, now)
            .await
            .unwrap();
        assert!(db.is_bad_actor(7, -100, now).await.unwrap());

        let later = now + Duration::seconds(61);
        assert!(!db.is_bad_actor(7, -100, later).await.unwrap());
        assert!(db.moderation.find_bad_actor(7, -100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_punishment_writes_both_rows() {
        let db = service().await;
        let now = Utc::now();
        db.ensure_group(-100, None, &defaults(), now).await.unwrap();

        let actor = db
            .record_punishment(7, -100, PunishAction::Ban, TriggerType::Profile, "bio", 0, now)
            .await
            .unwrap();
        assert!(actor.punishment_end.is_none());

        let stats = db.get_statistics().await.unwrap();
        assert_eq!(stats.bad_actors, 1);
        assert_eq!(stats.actions_logged, 1);
        assert_eq!(stats.groups, 1);
    }

    #[tokio::test]
    async fn test_kick_row_does_not_outlive_the_kick() {
        let db = service().await;
        let now = Utc::now();
        db.ensure_group(-100, None, &defaults(), now).await.unwrap();

        let actor = db
            .record_punishment(7, -100, PunishAction::Kick, TriggerType::Message, "link", 3600, now)
            .await
            .unwrap();
        assert_eq!(actor.punishment_end, Some(now));
        assert!(!db.is_bad_actor(7, -100, now).await.unwrap());
        assert_eq!(db.moderation.count_action_log().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_forget_group_cascades() {
        let db = service().await;
        let now = Utc::now();
        db.ensure_group(-100, None, &defaults(), now).await.unwrap();
        db.moderation.add_group_exemption(-100, 5, now).await.unwrap();
        db.record_punishment(7, -100, PunishAction::Mute, TriggerType::Message, "x", 60, now)
            .await
            .unwrap();

        assert!(db.forget_group(-100).await.unwrap());
        assert!(!db.moderation.is_group_exempt(-100, 5).await.unwrap());
        assert_eq!(db.moderation.count_bad_actors().await.unwrap(), 0);
        // audit log outlives the group
        assert_eq!(db.moderation.count_action_log().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_verification_channel_setting() {
        let db = service().await;
        assert_eq!(db.verification_channel().await.unwrap(), None);
        db.set_verification_channel(Some(-1001234)).await.unwrap();
        assert_eq!(db.verification_channel().await.unwrap(), Some(-1001234));
        db.set_verification_channel(None).await.unwrap();
        assert_eq!(db.verification_channel().await.unwrap(), None);
    }
}
