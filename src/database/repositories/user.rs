//! User repository implementation

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::user::{UpsertUserRequest, User};
use crate::utils::errors::SentinelError;

const USER_COLUMNS: &str = "id, username, first_name, last_name, last_seen_at, has_started_bot";

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create or refresh a user on interaction. The started flag only ever
    /// flips when the request carries one.
    pub async fn upsert(
        &self,
        request: UpsertUserRequest,
        now: DateTime<Utc>,
    ) -> Result<User, SentinelError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, first_name, last_name, last_seen_at, has_started_bot)
            VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, 0))
            ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                last_seen_at = excluded.last_seen_at,
                has_started_bot = COALESCE(?6, users.has_started_bot)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(request.id)
        .bind(request.username.map(|u| u.to_lowercase()))
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(now)
        .bind(request.has_started_bot)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, SentinelError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by username (case-insensitive, with or without `@`)
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, SentinelError> {
        let normalized = username.trim_start_matches('@').to_lowercase();
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?1 ORDER BY last_seen_at DESC LIMIT 1",
            USER_COLUMNS
        ))
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn set_started(&self, id: i64, started: bool) -> Result<(), SentinelError> {
        sqlx::query("UPDATE users SET has_started_bot = ?2 WHERE id = ?1")
            .bind(id)
            .bind(started)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// IDs of users who started the bot in private
    pub async fn started_user_ids(&self) -> Result<Vec<i64>, SentinelError> {
        let ids: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE has_started_bot = 1 ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, SentinelError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Count users who started the bot
    pub async fn count_started(&self) -> Result<i64, SentinelError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE has_started_bot = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
