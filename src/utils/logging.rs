//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging helpers
//! for moderation and admin events.

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::utils::errors::{Result, SentinelError};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, "bard_sentinel.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()
        .map_err(|e| SentinelError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!(level = %config.level, directory = %config.directory, "Logging initialized");
    Ok(guard)
}

/// Log a punitive action taken against a user
pub fn log_moderation_action(
    chat_id: i64,
    user_id: i64,
    action: &str,
    trigger: &str,
    duration_seconds: u64,
) {
    warn!(
        chat_id = chat_id,
        user_id = user_id,
        action = action,
        trigger = trigger,
        duration_seconds = duration_seconds,
        "Moderation action applied"
    );
}

/// Log an action skipped because the same subject was acted on recently
pub fn log_debounced(chat_id: i64, user_id: i64, subject: &str) {
    debug!(
        chat_id = chat_id,
        user_id = user_id,
        subject = subject,
        "Debounced repeat action"
    );
}

/// Log group events
pub fn log_group_event(group_id: i64, event: &str, details: Option<&str>) {
    info!(
        group_id = group_id,
        event = event,
        details = details,
        "Group event occurred"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
