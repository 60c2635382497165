//! Moderation models: punishments, violation categories and their records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Action applied to a violator, configurable per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PunishAction {
    Mute,
    Kick,
    Ban,
}

impl PunishAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunishAction::Mute => "mute",
            PunishAction::Kick => "kick",
            PunishAction::Ban => "ban",
        }
    }

    /// Past participle used in notifications ("has been muted")
    pub fn past_tense(&self) -> &'static str {
        match self {
            PunishAction::Mute => "muted",
            PunishAction::Kick => "kicked",
            PunishAction::Ban => "banned",
        }
    }
}

impl fmt::Display for PunishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PunishAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mute" => Ok(PunishAction::Mute),
            "kick" => Ok(PunishAction::Kick),
            "ban" => Ok(PunishAction::Ban),
            other => Err(format!("unknown punish action '{}'", other)),
        }
    }
}

/// Violation category, selects which group duration applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TriggerType {
    Profile,
    Message,
    MentionProfile,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Profile => "profile",
            TriggerType::Message => "message",
            TriggerType::MentionProfile => "mention_profile",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a piece of text was flagged for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    ForbiddenLink,
    ForbiddenWord,
    ExcessiveMentions,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::ForbiddenLink => "forbidden_link",
            IssueType::ForbiddenWord => "forbidden_word",
            IssueType::ExcessiveMentions => "excessive_mentions",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile fields, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FirstName,
    LastName,
    Bio,
    Username,
}

impl ProfileField {
    pub const CHECK_ORDER: [ProfileField; 4] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Bio,
        ProfileField::Username,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::FirstName => "first_name",
            ProfileField::LastName => "last_name",
            ProfileField::Bio => "bio",
            ProfileField::Username => "username",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user flagged in a group, optionally until `punishment_end`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BadActor {
    pub user_id: i64,
    pub group_id: i64,
    pub reason: String,
    pub punishment_type: PunishAction,
    pub punishment_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BadActor {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.punishment_end, Some(end) if end <= now)
    }
}

/// Append-only audit record of a punitive action
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub action: PunishAction,
    pub trigger_type: TriggerType,
    pub reason: String,
    pub duration_seconds: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_punish_action_parse() {
        assert_eq!("MUTE".parse::<PunishAction>(), Ok(PunishAction::Mute));
        assert_eq!(" ban ".parse::<PunishAction>(), Ok(PunishAction::Ban));
        assert!("warn".parse::<PunishAction>().is_err());
        assert_eq!(PunishAction::Kick.past_tense(), "kicked");
    }

    #[test]
    fn test_bad_actor_expiry() {
        let now = Utc::now();
        let mut actor = BadActor {
            user_id: 1,
            group_id: -1,
            reason: "test".to_string(),
            punishment_type: PunishAction::Mute,
            punishment_end: Some(now - Duration::seconds(1)),
            created_at: now,
        };
        assert!(actor.is_expired(now));

        actor.punishment_end = None;
        assert!(!actor.is_expired(now));
    }
}
