//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from the INI file and environment variables.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::PunishAction;
use crate::utils::helpers::parse_duration;

/// Main application configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub punishment: PunishmentConfig,
    pub cache: CacheConfig,
    pub broadcast: BroadcastConfig,
    pub unmute: UnmuteConfig,
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    /// Super admins, given as a comma separated list in the INI file
    #[serde(deserialize_with = "deserialize_id_list")]
    pub authorized_users: Vec<i64>,
    /// Channel users must join before they can unmute themselves
    pub channel_id: Option<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Defaults applied to groups the bot has not seen before
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PunishmentConfig {
    pub action: String,
    pub duration_profile: String,
    pub duration_message: String,
    pub duration_mention: String,
    pub min_username_length: usize,
    pub max_mentions_per_message: usize,
}

/// TTL caches and debouncing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub profile_ttl_seconds: u64,
    pub username_ttl_seconds: u64,
    pub admin_ttl_seconds: u64,
    pub exemption_ttl_seconds: u64,
    pub debounce_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

/// Broadcast pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub send_interval_ms: u64,
}

/// Self-service unmute
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnmuteConfig {
    pub cooldown_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

/// Group defaults resolved to typed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDefaults {
    pub action: PunishAction,
    pub duration_profile: u64,
    pub duration_message: u64,
    pub duration_mention: u64,
}

impl Settings {
    /// Load settings from `config.ini` (optional) and `SENTINEL__*` variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Load settings from an explicit file, still applying environment overrides
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        Self::load(Some(path))
    }

    fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("SENTINEL").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SentinelError> {
        super::validation::validate_settings(self)
    }

    /// Typed group defaults. Only valid after [`Settings::validate`] passed;
    /// unparsable values fall back to the built-in defaults.
    pub fn group_defaults(&self) -> GroupDefaults {
        let fallback = PunishmentConfig::default();
        let seconds = |value: &str, default: &str| {
            parse_duration(value)
                .or_else(|| parse_duration(default))
                .unwrap_or(0)
        };

        GroupDefaults {
            action: self.punishment.action.parse().unwrap_or(PunishAction::Mute),
            duration_profile: seconds(&self.punishment.duration_profile, &fallback.duration_profile),
            duration_message: seconds(&self.punishment.duration_message, &fallback.duration_message),
            duration_mention: seconds(&self.punishment.duration_mention, &fallback.duration_mention),
        }
    }

    pub fn is_super_admin(&self, user_id: i64) -> bool {
        self.bot.authorized_users.contains(&user_id)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bard_sentinel.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for PunishmentConfig {
    fn default() -> Self {
        Self {
            action: "mute".to_string(),
            duration_profile: "0".to_string(),
            duration_message: "1h".to_string(),
            duration_mention: "0".to_string(),
            min_username_length: 5,
            max_mentions_per_message: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            profile_ttl_seconds: 3600,
            username_ttl_seconds: 86_400,
            admin_ttl_seconds: 300,
            exemption_ttl_seconds: 300,
            debounce_seconds: 60,
            cleanup_interval_seconds: 3600,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { send_interval_ms: 500 }
    }
}

impl Default for UnmuteConfig {
    fn default() -> Self {
        Self { cooldown_seconds: 60 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
        }
    }
}

fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdList {
        Text(String),
        Single(i64),
        Many(Vec<i64>),
    }

    match IdList::deserialize(deserializer)? {
        IdList::Text(text) => text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid user id '{}'", part)))
            })
            .collect(),
        IdList::Single(id) => Ok(vec![id]),
        IdList::Many(ids) => Ok(ids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_ini_file() {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        writeln!(
            file,
            "[bot]\ntoken = 123:abc\nauthorized_users = 11, 22,33\nchannel_id = -100500\n\n\
             [punishment]\naction = ban\nduration_message = 30m\nmin_username_length = 6\n"
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.bot.token, "123:abc");
        assert_eq!(settings.bot.authorized_users, vec![11, 22, 33]);
        assert_eq!(settings.bot.channel_id, Some(-100500));
        assert_eq!(settings.punishment.min_username_length, 6);
        // untouched sections keep their defaults
        assert_eq!(settings.cache.debounce_seconds, 60);

        let defaults = settings.group_defaults();
        assert_eq!(defaults.action, PunishAction::Ban);
        assert_eq!(defaults.duration_message, 1800);
        assert_eq!(defaults.duration_profile, 0);
    }

    #[test]
    fn test_super_admin() {
        let mut settings = Settings::default();
        settings.bot.authorized_users = vec![7];
        assert!(settings.is_super_admin(7));
        assert!(!settings.is_super_admin(8));
    }
}
