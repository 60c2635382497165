//! Inline button payloads
//!
//! Callback data is limited to 64 bytes by Telegram, so payloads are short
//! colon separated strings.

use std::fmt;
use std::str::FromStr;

use super::moderation::{PunishAction, TriggerType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Muted user asks to be unmuted
    Unmute { chat_id: i64, user_id: i64 },
    /// Admin approves and exempts a muted user
    Approve { chat_id: i64, user_id: i64 },
    /// Pick the group's punishment action
    SetPunish(PunishAction),
    /// Show the batch operations menu
    BatchMenu,
    /// Apply an action to every muted user of the group
    Batch(PunishAction),
    /// Back to the action picker
    PunishMenu,
    /// Check membership of the verification channel
    Verify,
    /// Preset duration; `None` trigger means all three
    SetDuration {
        trigger: Option<TriggerType>,
        seconds: u64,
    },
}

impl CallbackAction {
    pub fn data(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Unmute { chat_id, user_id } => write!(f, "unmute:{}:{}", chat_id, user_id),
            CallbackAction::Approve { chat_id, user_id } => write!(f, "approve:{}:{}", chat_id, user_id),
            CallbackAction::SetPunish(action) => write!(f, "punish:{}", action),
            CallbackAction::BatchMenu => f.write_str("punish:batch"),
            CallbackAction::Batch(action) => write!(f, "batch:{}", action),
            CallbackAction::PunishMenu => f.write_str("punish:back"),
            CallbackAction::Verify => f.write_str("verify"),
            CallbackAction::SetDuration { trigger, seconds } => write!(
                f,
                "dur:{}:{}",
                trigger.map(|t| t.as_str()).unwrap_or("all"),
                seconds
            ),
        }
    }
}

fn parse_trigger(s: &str) -> Result<Option<TriggerType>, String> {
    match s {
        "all" => Ok(None),
        "profile" => Ok(Some(TriggerType::Profile)),
        "message" => Ok(Some(TriggerType::Message)),
        "mention_profile" => Ok(Some(TriggerType::MentionProfile)),
        other => Err(format!("unknown trigger '{}'", other)),
    }
}

impl FromStr for CallbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let id = |value: &str| value.parse::<i64>().map_err(|_| format!("invalid id in '{}'", s));

        match parts.as_slice() {
            ["unmute", chat, user] => Ok(CallbackAction::Unmute {
                chat_id: id(*chat)?,
                user_id: id(*user)?,
            }),
            ["approve", chat, user] => Ok(CallbackAction::Approve {
                chat_id: id(*chat)?,
                user_id: id(*user)?,
            }),
            ["verify"] => Ok(CallbackAction::Verify),
            ["punish", "batch"] => Ok(CallbackAction::BatchMenu),
            ["punish", "back"] => Ok(CallbackAction::PunishMenu),
            ["punish", action] => action.parse().map(CallbackAction::SetPunish),
            ["batch", action] => match action.parse()? {
                PunishAction::Mute => Err("batch mute is not an operation".to_string()),
                action => Ok(CallbackAction::Batch(action)),
            },
            ["dur", trigger, seconds] => Ok(CallbackAction::SetDuration {
                trigger: parse_trigger(trigger)?,
                seconds: seconds
                    .parse()
                    .map_err(|_| format!("invalid duration in '{}'", s))?,
            }),
            _ => Err(format!("unknown callback data '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_fit_telegram_limit() {
        let longest = CallbackAction::Approve {
            chat_id: -1_009_999_999_999,
            user_id: 9_999_999_999,
        };
        assert!(longest.data().len() <= 64);
    }

    #[test]
    fn test_parse_payloads() {
        assert_eq!(
            "unmute:-100123:42".parse(),
            Ok(CallbackAction::Unmute { chat_id: -100123, user_id: 42 })
        );
        assert_eq!("punish:kick".parse(), Ok(CallbackAction::SetPunish(PunishAction::Kick)));
        assert_eq!("punish:batch".parse(), Ok(CallbackAction::BatchMenu));
        assert_eq!("verify".parse(), Ok(CallbackAction::Verify));
        assert_eq!("batch:ban".parse(), Ok(CallbackAction::Batch(PunishAction::Ban)));
        assert!("batch:mute".parse::<CallbackAction>().is_err());
        assert_eq!(
            "dur:mention_profile:3600".parse(),
            Ok(CallbackAction::SetDuration {
                trigger: Some(TriggerType::MentionProfile),
                seconds: 3600
            })
        );
        assert_eq!(
            CallbackAction::SetDuration { trigger: None, seconds: 0 }.data(),
            "dur:all:0"
        );
        assert!("unmute:abc:1".parse::<CallbackAction>().is_err());
        assert!("something".parse::<CallbackAction>().is_err());
    }
}
