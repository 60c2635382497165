//! Runtime switches and self-service bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A feature flag; features without a row are enabled
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeatureControl {
    pub feature_name: String,
    pub is_enabled: bool,
}

/// Last self-service unmute attempt of a user in a chat
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UnmuteAttempt {
    pub user_id: i64,
    pub chat_id: i64,
    pub last_attempt_at: DateTime<Utc>,
}
