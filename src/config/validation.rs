//! Configuration validation module
//!
//! Rejects settings the bot cannot run with before anything starts.

use crate::models::PunishAction;
use crate::utils::errors::{Result, SentinelError};
use crate::utils::helpers::{parse_duration, MAX_DURATION_SECONDS};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_punishment_config(&settings.punishment)?;
    validate_cache_config(&settings.cache)?;
    validate_unmute_config(&settings.unmute)?;
    validate_logging_config(&settings.logging)?;

    if settings.bot.authorized_users.is_empty() {
        tracing::warn!("No authorized users configured, super admin commands are unusable");
    }

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.trim().is_empty() {
        return Err(SentinelError::Config(
            "Bot token is required (bot.token or SENTINEL__BOT__TOKEN)".to_string(),
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SentinelError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(SentinelError::Config(
            "Max connections must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate punishment defaults
fn validate_punishment_config(config: &super::PunishmentConfig) -> Result<()> {
    if config.action.parse::<PunishAction>().is_err() {
        return Err(SentinelError::Config(format!(
            "Invalid punishment action '{}'. Valid actions: mute, kick, ban",
            config.action
        )));
    }

    for (name, value) in [
        ("duration_profile", &config.duration_profile),
        ("duration_message", &config.duration_message),
        ("duration_mention", &config.duration_mention),
    ] {
        if parse_duration(value).is_none() {
            return Err(SentinelError::Config(format!(
                "Invalid punishment.{} '{}'. Use formats like 30m, 1h, 2d or 0",
                name, value
            )));
        }
    }

    if !(1..=32).contains(&config.min_username_length) {
        return Err(SentinelError::Config(
            "min_username_length must be between 1 and 32".to_string(),
        ));
    }

    Ok(())
}

/// Validate cache configuration
fn validate_cache_config(config: &super::CacheConfig) -> Result<()> {
    if config.max_entries == 0 {
        return Err(SentinelError::Config(
            "cache.max_entries must be greater than 0".to_string(),
        ));
    }

    if config.cleanup_interval_seconds == 0 {
        return Err(SentinelError::Config(
            "cache.cleanup_interval_seconds must be greater than 0".to_string(),
        ));
    }

    for (name, value) in [
        ("profile_ttl_seconds", config.profile_ttl_seconds),
        ("username_ttl_seconds", config.username_ttl_seconds),
        ("admin_ttl_seconds", config.admin_ttl_seconds),
        ("exemption_ttl_seconds", config.exemption_ttl_seconds),
        ("debounce_seconds", config.debounce_seconds),
        ("cleanup_interval_seconds", config.cleanup_interval_seconds),
    ] {
        if value > MAX_DURATION_SECONDS {
            return Err(SentinelError::Config(format!(
                "cache.{} must be at most {}",
                name, MAX_DURATION_SECONDS
            )));
        }
    }

    Ok(())
}

/// Validate unmute configuration
fn validate_unmute_config(config: &super::UnmuteConfig) -> Result<()> {
    if config.cooldown_seconds > MAX_DURATION_SECONDS {
        return Err(SentinelError::Config(format!(
            "unmute.cooldown_seconds must be at most {}",
            MAX_DURATION_SECONDS
        )));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(SentinelError::Config(format!(
            "Invalid log level: {}. Valid levels: {:?}",
            config.level, valid_levels
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "123:abc".to_string();
        settings
    }

    #[test]
    fn test_defaults_with_token_are_valid() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let settings = Settings::default();
        assert_matches!(validate_settings(&settings), Err(SentinelError::Config(_)));
    }

    #[test]
    fn test_bad_duration_rejected() {
        let mut settings = valid_settings();
        settings.punishment.duration_message = "soon".to_string();
        assert_matches!(validate_settings(&settings), Err(SentinelError::Config(msg)) if msg.contains("duration_message"));
    }

    #[test]
    fn test_bad_action_rejected() {
        let mut settings = valid_settings();
        settings.punishment.action = "warn".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let mut settings = valid_settings();
        settings.cache.profile_ttl_seconds = u64::MAX;
        assert_matches!(validate_settings(&settings), Err(SentinelError::Config(msg)) if msg.contains("profile_ttl_seconds"));

        let mut settings = valid_settings();
        settings.unmute.cooldown_seconds = u64::MAX;
        assert_matches!(validate_settings(&settings), Err(SentinelError::Config(msg)) if msg.contains("cooldown_seconds"));
    }

    #[test]
    fn test_oversized_duration_rejected() {
        let mut settings = valid_settings();
        settings.punishment.duration_profile = "99999999w".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut settings = valid_settings();
        settings.logging.level = "loud".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
