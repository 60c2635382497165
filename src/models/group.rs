//! Group model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::moderation::{PunishAction, TriggerType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: i64,
    pub name: Option<String>,
    pub added_at: DateTime<Utc>,
    pub punish_action: PunishAction,
    pub punish_duration_profile: i64,
    pub punish_duration_message: i64,
    pub punish_duration_mention: i64,
}

impl Group {
    /// Configured duration in seconds for a trigger type, 0 meaning permanent
    pub fn duration_for(&self, trigger: TriggerType) -> u64 {
        let seconds = match trigger {
            TriggerType::Profile => self.punish_duration_profile,
            TriggerType::Message => self.punish_duration_message,
            TriggerType::MentionProfile => self.punish_duration_mention,
        };
        seconds.max(0) as u64
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupMember {
    pub group_id: i64,
    pub user_id: i64,
    pub seen_at: DateTime<Utc>,
}

/// Partial update of a group's punishment settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroupPunishment {
    pub action: Option<PunishAction>,
    pub duration_profile: Option<u64>,
    pub duration_message: Option<u64>,
    pub duration_mention: Option<u64>,
}

impl UpdateGroupPunishment {
    /// The same duration for every trigger type
    pub fn all_durations(seconds: u64) -> Self {
        Self {
            action: None,
            duration_profile: Some(seconds),
            duration_message: Some(seconds),
            duration_mention: Some(seconds),
        }
    }

    pub fn duration(trigger: TriggerType, seconds: u64) -> Self {
        let mut update = Self::default();
        match trigger {
            TriggerType::Profile => update.duration_profile = Some(seconds),
            TriggerType::Message => update.duration_message = Some(seconds),
            TriggerType::MentionProfile => update.duration_mention = Some(seconds),
        }
        update
    }
}
