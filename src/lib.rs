//! Bard's Sentinel Telegram Bot
//!
//! A moderation bot for Telegram groups. It scans messages, user profiles
//! and mentions for forbidden links and keywords, punishes violators
//! with a mute, kick or ban, and gives admins commands to tune it.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod handlers;
pub mod i18n;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{BotApiError, Result, SentinelError};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use i18n::I18n;
pub use services::AppContext;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
