//! Bard's Sentinel Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use BardSentinel::{
    database::{create_pool, run_migrations, DatabaseConfig, DatabaseService},
    handlers::{self, Command},
    i18n::I18n,
    services::{AppContext, BotApi, TelegramBot},
    utils::{clock::SystemClock, logging},
    BotApiError, Settings,
};

/// Directory with translation files overriding the embedded ones
const TRANSLATIONS_DIR: &str = "translations";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    settings.validate()?;

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", BardSentinel::info());

    // Initialize database connection
    info!("Connecting to database...");
    let pool = create_pool(&DatabaseConfig::from(&settings.database)).await?;

    info!("Running database migrations...");
    run_migrations(&pool).await?;
    let db = DatabaseService::new(pool);

    // Initialize i18n system
    info!("Loading translations...");
    let mut i18n = I18n::embedded()?;
    if let Err(e) = i18n.load_overrides(TRANSLATIONS_DIR).await {
        warn!(error = %e, "Using embedded translations only");
    }

    // Initialize bot
    let bot = Bot::new(&settings.bot.token);
    let api = Arc::new(TelegramBot::new(bot.clone()));
    let identity = match api.get_me().await {
        Ok(identity) => identity,
        Err(BotApiError::InvalidToken) => {
            error!("The bot token was rejected by Telegram");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Could not reach the Telegram API"),
    };
    info!(bot_id = identity.id, username = %identity.username, "Authenticated with Telegram");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Could not register the command list");
    }

    // Initialize services
    info!("Initializing services...");
    let ctx = Arc::new(AppContext::new(
        settings,
        db,
        api,
        Arc::new(SystemClock),
        i18n,
        identity,
    )?);

    if ctx.auth.restore_maintenance().await? {
        warn!("Maintenance mode is on");
    }
    ctx.broadcasts.restore_jobs().await?;
    let cleanup = ctx.spawn_cleanup_job();

    // Create dispatcher with dependencies registered
    let mut dispatcher = Dispatcher::builder(bot.clone(), handlers::schema())
        .dependencies(dptree::deps![ctx.clone()])
        .default_handler(|upd| async move {
            tracing::debug!(update_id = upd.id.0, "Unhandled update");
        })
        .enable_ctrlc_handler()
        .build();

    info!("Bard's Sentinel is ready, starting long polling...");

    let listener = Polling::builder(bot).drop_pending_updates().build();
    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    cleanup.abort();
    ctx.broadcasts.shutdown();
    info!("Bard's Sentinel has been shut down.");

    Ok(())
}
