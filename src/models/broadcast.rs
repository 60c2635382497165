//! Broadcast models: targets, repeating jobs and button markup

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Who a broadcast goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastTarget {
    /// Every known group
    Groups,
    /// Every user who started the bot in private
    Users,
    /// Groups and users
    Everyone,
    /// A single chat
    Chat(i64),
}

impl fmt::Display for BroadcastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastTarget::Groups => f.write_str("groups"),
            BroadcastTarget::Users => f.write_str("users"),
            BroadcastTarget::Everyone => f.write_str("all"),
            BroadcastTarget::Chat(id) => write!(f, "chat:{}", id),
        }
    }
}

impl FromStr for BroadcastTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "groups" => Ok(BroadcastTarget::Groups),
            "users" => Ok(BroadcastTarget::Users),
            "all" => Ok(BroadcastTarget::Everyone),
            other => other
                .strip_prefix("chat:")
                .and_then(|id| id.parse().ok())
                .map(BroadcastTarget::Chat)
                .ok_or_else(|| format!("unknown broadcast target '{}'", other)),
        }
    }
}

/// A persisted repeating broadcast
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimedBroadcast {
    pub job_name: String,
    pub target_type: String,
    pub message_text: String,
    pub interval_seconds: i64,
    pub next_run_at: DateTime<Utc>,
    /// JSON-serialized [`Keyboard`]
    pub markup_json: Option<String>,
}

impl TimedBroadcast {
    pub fn target(&self) -> Option<BroadcastTarget> {
        self.target_type.parse().ok()
    }

    pub fn keyboard(&self) -> Option<Keyboard> {
        self.markup_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

/// Inline keyboard independent of the Telegram client library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub kind: ButtonKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Callback(String),
    Url(String),
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ButtonKind::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ButtonKind::Url(url.into()),
        }
    }
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!("groups".parse(), Ok(BroadcastTarget::Groups));
        assert_eq!("all".parse(), Ok(BroadcastTarget::Everyone));
        assert_eq!("chat:-100123".parse(), Ok(BroadcastTarget::Chat(-100123)));
        assert!("chat:abc".parse::<BroadcastTarget>().is_err());
        assert_eq!(BroadcastTarget::Chat(5).to_string(), "chat:5");
    }

    #[test]
    fn test_keyboard_from_markup_json() {
        let keyboard = Keyboard::single(Button::url("Add me", "https://t.me/bot?startgroup=true"));
        let job = TimedBroadcast {
            job_name: "job".to_string(),
            target_type: "users".to_string(),
            message_text: "hi".to_string(),
            interval_seconds: 3600,
            next_run_at: Utc::now(),
            markup_json: Some(serde_json::to_string(&keyboard).unwrap()),
        };
        assert_eq!(job.keyboard(), Some(keyboard));
        assert_eq!(job.target(), Some(BroadcastTarget::Users));
    }
}
