//! Admin repository implementation
//!
//! Feature flags, bot settings, unmute bookkeeping and timed broadcasts.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::broadcast::TimedBroadcast;
use crate::models::settings::{FeatureControl, UnmuteAttempt};
use crate::utils::errors::SentinelError;

#[derive(Clone, Debug)]
pub struct AdminRepository {
    pool: SqlitePool,
}

impl AdminRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // Feature control methods
    /// Enable or disable a feature
    pub async fn set_feature(&self, name: &str, enabled: bool) -> Result<(), SentinelError> {
        sqlx::query(
            r#"
            INSERT INTO feature_control (feature_name, is_enabled)
            VALUES (?1, ?2)
            ON CONFLICT (feature_name) DO UPDATE SET is_enabled = excluded.is_enabled
            "#,
        )
        .bind(name)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Features without a row are enabled
    pub async fn is_feature_enabled(&self, name: &str) -> Result<bool, SentinelError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_enabled FROM feature_control WHERE feature_name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(enabled,)| enabled).unwrap_or(true))
    }

    pub async fn list_features(&self) -> Result<Vec<FeatureControl>, SentinelError> {
        let features = sqlx::query_as::<_, FeatureControl>(
            "SELECT feature_name, is_enabled FROM feature_control ORDER BY feature_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(features)
    }

    // Bot settings methods
    /// Get bot setting by key
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, SentinelError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM bot_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), SentinelError> {
        sqlx::query(
            r#"
            INSERT INTO bot_settings (key, value)
            VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> Result<bool, SentinelError> {
        let result = sqlx::query("DELETE FROM bot_settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Unmute attempt methods
    pub async fn last_unmute_attempt(
        &self,
        user_id: i64,
        chat_id: i64,
    ) -> Result<Option<UnmuteAttempt>, SentinelError> {
        let attempt = sqlx::query_as::<_, UnmuteAttempt>(
            "SELECT user_id, chat_id, last_attempt_at FROM unmute_attempts WHERE user_id = ?1 AND chat_id = ?2",
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    pub async fn record_unmute_attempt(
        &self,
        user_id: i64,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), SentinelError> {
        sqlx::query(
            r#"
            INSERT INTO unmute_attempts (user_id, chat_id, last_attempt_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id, chat_id) DO UPDATE SET last_attempt_at = excluded.last_attempt_at
            "#,
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Timed broadcast methods
    /// Persist a repeating broadcast, replacing a job of the same name
    pub async fn upsert_timed_broadcast(&self, job: &TimedBroadcast) -> Result<(), SentinelError> {
        sqlx::query(
            r#"
            INSERT INTO timed_broadcasts (job_name, target_type, message_text, interval_seconds, next_run_at, markup_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (job_name) DO UPDATE SET
                target_type = excluded.target_type,
                message_text = excluded.message_text,
                interval_seconds = excluded.interval_seconds,
                next_run_at = excluded.next_run_at,
                markup_json = excluded.markup_json
            "#,
        )
        .bind(&job.job_name)
        .bind(&job.target_type)
        .bind(&job.message_text)
        .bind(job.interval_seconds)
        .bind(job.next_run_at)
        .bind(&job.markup_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_timed_broadcasts(&self) -> Result<Vec<TimedBroadcast>, SentinelError> {
        let jobs = sqlx::query_as::<_, TimedBroadcast>(
            r#"
            SELECT job_name, target_type, message_text, interval_seconds, next_run_at, markup_json
            FROM timed_broadcasts
            ORDER BY next_run_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    pub async fn update_next_run(
        &self,
        job_name: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), SentinelError> {
        sqlx::query("UPDATE timed_broadcasts SET next_run_at = ?2 WHERE job_name = ?1")
            .bind(job_name)
            .bind(next_run_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_timed_broadcast(&self, job_name: &str) -> Result<bool, SentinelError> {
        let result = sqlx::query("DELETE FROM timed_broadcasts WHERE job_name = ?1")
            .bind(job_name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_timed_broadcasts(&self) -> Result<u64, SentinelError> {
        let result = sqlx::query("DELETE FROM timed_broadcasts")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
