//! Exemptions, bad actors and the action log

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::moderation::{ActionLogEntry, BadActor, PunishAction, TriggerType};
use crate::utils::errors::SentinelError;

const BAD_ACTOR_COLUMNS: &str =
    "user_id, group_id, reason, punishment_type, punishment_end, created_at";

/// Fields of an action log row before insertion
#[derive(Debug, Clone)]
pub struct NewActionLog<'a> {
    pub user_id: i64,
    pub group_id: i64,
    pub action: PunishAction,
    pub trigger_type: TriggerType,
    pub reason: &'a str,
    pub duration_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct ModerationRepository {
    pool: SqlitePool,
}

impl ModerationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Exempt a user in one group. Returns false when already exempt.
    pub async fn add_group_exemption(
        &self,
        group_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, SentinelError> {
        let result = sqlx::query(
            r#"
            INSERT INTO group_user_exemptions (group_id, user_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (group_id, user_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_group_exemption(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, SentinelError> {
        let result =
            sqlx::query("DELETE FROM group_user_exemptions WHERE group_id = ?1 AND user_id = ?2")
                .bind(group_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_group_exempt(&self, group_id: i64, user_id: i64) -> Result<bool, SentinelError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM group_user_exemptions WHERE group_id = ?1 AND user_id = ?2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Exempt a user everywhere. Returns false when already exempt.
    pub async fn add_global_exemption(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, SentinelError> {
        let result = sqlx::query(
            r#"
            INSERT INTO global_exemptions (user_id, created_at)
            VALUES (?1, ?2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_global_exemption(&self, user_id: i64) -> Result<bool, SentinelError> {
        let result = sqlx::query("DELETE FROM global_exemptions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_globally_exempt(&self, user_id: i64) -> Result<bool, SentinelError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM global_exemptions WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Record or replace the bad actor entry of a user in a group
    pub async fn upsert_bad_actor(
        &self,
        user_id: i64,
        group_id: i64,
        reason: &str,
        action: PunishAction,
        punishment_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<BadActor, SentinelError> {
        let actor = sqlx::query_as::<_, BadActor>(&format!(
            r#"
            INSERT INTO bad_actors (user_id, group_id, reason, punishment_type, punishment_end, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id, group_id) DO UPDATE SET
                reason = excluded.reason,
                punishment_type = excluded.punishment_type,
                punishment_end = excluded.punishment_end,
                created_at = excluded.created_at
            RETURNING {}
            "#,
            BAD_ACTOR_COLUMNS
        ))
        .bind(user_id)
        .bind(group_id)
        .bind(reason)
        .bind(action)
        .bind(punishment_end)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(actor)
    }

    pub async fn find_bad_actor(
        &self,
        user_id: i64,
        group_id: i64,
    ) -> Result<Option<BadActor>, SentinelError> {
        let actor = sqlx::query_as::<_, BadActor>(&format!(
            "SELECT {} FROM bad_actors WHERE user_id = ?1 AND group_id = ?2",
            BAD_ACTOR_COLUMNS
        ))
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(actor)
    }

    pub async fn delete_bad_actor(&self, user_id: i64, group_id: i64) -> Result<bool, SentinelError> {
        let result = sqlx::query("DELETE FROM bad_actors WHERE user_id = ?1 AND group_id = ?2")
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bad actors of a group, optionally restricted to one punishment type
    pub async fn bad_actors_in_group(
        &self,
        group_id: i64,
        action: Option<PunishAction>,
    ) -> Result<Vec<BadActor>, SentinelError> {
        let actors = sqlx::query_as::<_, BadActor>(&format!(
            r#"
            SELECT {} FROM bad_actors
            WHERE group_id = ?1 AND (?2 IS NULL OR punishment_type = ?2)
            ORDER BY created_at ASC
            "#,
            BAD_ACTOR_COLUMNS
        ))
        .bind(group_id)
        .bind(action)
        .fetch_all(&self.pool)
        .await?;

        Ok(actors)
    }

    /// Drop entries whose punishment already ended
    pub async fn delete_expired_bad_actors(&self, now: DateTime<Utc>) -> Result<u64, SentinelError> {
        let result = sqlx::query(
            "DELETE FROM bad_actors WHERE punishment_end IS NOT NULL AND punishment_end <= ?1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_bad_actors(&self) -> Result<i64, SentinelError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bad_actors")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Append to the audit log, returning the new row ID
    pub async fn insert_action_log(
        &self,
        entry: NewActionLog<'_>,
        now: DateTime<Utc>,
    ) -> Result<i64, SentinelError> {
        let result = sqlx::query(
            r#"
            INSERT INTO action_log (user_id, group_id, action, trigger_type, reason, duration_seconds, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.group_id)
        .bind(entry.action)
        .bind(entry.trigger_type)
        .bind(entry.reason)
        .bind(entry.duration_seconds as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_action_log(&self) -> Result<i64, SentinelError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM action_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Audit history of a user, newest first
    pub async fn action_log_for_user(&self, user_id: i64) -> Result<Vec<ActionLogEntry>, SentinelError> {
        let entries = sqlx::query_as::<_, ActionLogEntry>(
            r#"
            SELECT id, user_id, group_id, action, trigger_type, reason, duration_seconds, created_at
            FROM action_log
            WHERE user_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
