//! Group repository implementation

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::config::GroupDefaults;
use crate::models::group::{Group, UpdateGroupPunishment};
use crate::utils::errors::SentinelError;

const GROUP_COLUMNS: &str = "id, name, added_at, punish_action, punish_duration_profile, punish_duration_message, punish_duration_mention";

#[derive(Clone, Debug)]
pub struct GroupRepository {
    pool: SqlitePool,
}

impl GroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a group with the configured defaults, or refresh its name
    pub async fn upsert(
        &self,
        id: i64,
        name: Option<&str>,
        defaults: &GroupDefaults,
        now: DateTime<Utc>,
    ) -> Result<Group, SentinelError> {
        let group = sqlx::query_as::<_, Group>(&format!(
            r#"
            INSERT INTO groups (id, name, added_at, punish_action, punish_duration_profile, punish_duration_message, punish_duration_mention)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (id) DO UPDATE SET name = COALESCE(excluded.name, groups.name)
            RETURNING {}
            "#,
            GROUP_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(now)
        .bind(defaults.action)
        .bind(defaults.duration_profile as i64)
        .bind(defaults.duration_message as i64)
        .bind(defaults.duration_mention as i64)
        .fetch_one(&self.pool)
        .await?;

        Ok(group)
    }

    /// Find group by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Group>, SentinelError> {
        let group = sqlx::query_as::<_, Group>(&format!(
            "SELECT {} FROM groups WHERE id = ?1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    /// Update punishment action and durations, leaving unset fields untouched
    pub async fn update_punishment(
        &self,
        id: i64,
        request: UpdateGroupPunishment,
    ) -> Result<Group, SentinelError> {
        let to_i64 = |value: Option<u64>| value.map(|v| v as i64);

        let group = sqlx::query_as::<_, Group>(&format!(
            r#"
            UPDATE groups
            SET punish_action = COALESCE(?2, punish_action),
                punish_duration_profile = COALESCE(?3, punish_duration_profile),
                punish_duration_message = COALESCE(?4, punish_duration_message),
                punish_duration_mention = COALESCE(?5, punish_duration_mention)
            WHERE id = ?1
            RETURNING {}
            "#,
            GROUP_COLUMNS
        ))
        .bind(id)
        .bind(request.action)
        .bind(to_i64(request.duration_profile))
        .bind(to_i64(request.duration_message))
        .bind(to_i64(request.duration_mention))
        .fetch_optional(&self.pool)
        .await?;

        group.ok_or(SentinelError::GroupNotFound { group_id: id })
    }

    /// Delete group; exemptions, bad actors and members cascade
    pub async fn delete(&self, id: i64) -> Result<bool, SentinelError> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// IDs of all known groups
    pub async fn list_ids(&self) -> Result<Vec<i64>, SentinelError> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM groups ORDER BY added_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Count total groups
    pub async fn count(&self) -> Result<i64, SentinelError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM groups")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Record that a user was seen in a group
    pub async fn add_member(
        &self,
        group_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), SentinelError> {
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, seen_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (group_id, user_id) DO UPDATE SET seen_at = excluded.seen_at
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Users seen in a group
    pub async fn member_ids(&self, group_id: i64) -> Result<Vec<i64>, SentinelError> {
        let ids: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM group_members WHERE group_id = ?1")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
