//! Error handling for Bard's Sentinel
//!
//! This module defines the main error types used throughout the application
//! and the classification of Telegram Bot API failures.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the bot
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Telegram API error: {0}")]
    Api(#[from] BotApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Group not found: {group_id}")]
    GroupNotFound { group_id: i64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pattern compilation error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Classified failure of a Bot API call.
///
/// Every call into the Telegram collaborator is mapped onto one of these
/// buckets so callers can decide between retrying, cleaning up and skipping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotApiError {
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("the bot token is invalid")]
    InvalidToken,

    #[error("unexpected API error: {0}")]
    Unexpected(String),
}

impl BotApiError {
    /// Classify a raw Bot API error description such as
    /// `"Forbidden: bot was kicked from the group chat"`.
    pub fn from_description(description: &str) -> Self {
        let lowered = description.to_lowercase();
        if lowered.starts_with("forbidden") {
            BotApiError::Forbidden(description.to_string())
        } else if lowered.starts_with("bad request") {
            BotApiError::BadRequest(description.to_string())
        } else if lowered.starts_with("unauthorized") {
            BotApiError::InvalidToken
        } else {
            BotApiError::Unexpected(description.to_string())
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, BotApiError::Forbidden(_))
    }

    /// Errors worth another attempt with the same arguments
    pub fn is_transient(&self) -> bool {
        matches!(self, BotApiError::RateLimited(_) | BotApiError::Network(_))
    }
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Result type alias for Bot API calls
pub type ApiResult<T> = std::result::Result<T, BotApiError>;

impl SentinelError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SentinelError::Database(_) => false,
            SentinelError::Api(BotApiError::InvalidToken) => false,
            SentinelError::Api(_) => true,
            SentinelError::Config(_) => false,
            SentinelError::ConfigLoad(_) => false,
            SentinelError::PermissionDenied(_) => false,
            SentinelError::UserNotFound(_) => false,
            SentinelError::GroupNotFound { .. } => false,
            SentinelError::Serialization(_) => false,
            SentinelError::Io(_) => true,
            SentinelError::Pattern(_) => false,
            SentinelError::RateLimitExceeded => true,
            SentinelError::InvalidInput(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SentinelError::Database(_) => ErrorSeverity::Critical,
            SentinelError::Config(_) => ErrorSeverity::Critical,
            SentinelError::ConfigLoad(_) => ErrorSeverity::Critical,
            SentinelError::Pattern(_) => ErrorSeverity::Critical,
            SentinelError::Api(BotApiError::InvalidToken) => ErrorSeverity::Critical,
            SentinelError::Api(BotApiError::BadRequest(_)) => ErrorSeverity::Warning,
            SentinelError::PermissionDenied(_) => ErrorSeverity::Warning,
            SentinelError::RateLimitExceeded => ErrorSeverity::Warning,
            SentinelError::InvalidInput(_) => ErrorSeverity::Info,
            SentinelError::UserNotFound(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_descriptions() {
        assert!(BotApiError::from_description("Forbidden: bot was kicked from the group chat").is_forbidden());
        assert_eq!(
            BotApiError::from_description("Bad Request: message to delete not found"),
            BotApiError::BadRequest("Bad Request: message to delete not found".to_string())
        );
        assert_eq!(BotApiError::from_description("Unauthorized"), BotApiError::InvalidToken);
        assert!(matches!(
            BotApiError::from_description("Internal Server Error"),
            BotApiError::Unexpected(_)
        ));
    }

    #[test]
    fn test_invalid_token_is_fatal() {
        let err = SentinelError::Api(BotApiError::InvalidToken);
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = SentinelError::Api(BotApiError::Network("timeout".into()));
        assert!(err.is_recoverable());
    }
}
