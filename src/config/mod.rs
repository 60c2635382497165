//! Configuration management module
//!
//! This module handles loading and validation of application configuration
//! from the INI file and environment variables.

pub mod settings;
pub mod validation;

pub use settings::{
    BotConfig, BroadcastConfig, CacheConfig, DatabaseConfig, GroupDefaults, LoggingConfig,
    PunishmentConfig, Settings, UnmuteConfig,
};
