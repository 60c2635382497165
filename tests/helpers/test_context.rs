//! Test context for unified test setup
//!
//! Wires a full [`AppContext`] around an in-memory database, the
//! [`FakeBot`] and a manually advanced clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use BardSentinel::config::Settings;
use BardSentinel::database::{create_pool, run_migrations, DatabaseConfig, DatabaseService};
use BardSentinel::i18n::I18n;
use BardSentinel::models::{Group, UpsertUserRequest};
use BardSentinel::services::{AppContext, BotIdentity, IncomingMessage, ProfileSnapshot};
use BardSentinel::utils::clock::{Clock, ManualClock};

use super::fake_bot::{FakeBot, BOT_ID, BOT_USERNAME};

pub const SUPER_ADMIN: i64 = 1;
pub const GROUP_ID: i64 = -100_123;
pub const GROUP_TITLE: &str = "Round Table";

pub struct TestContext {
    pub ctx: AppContext,
    pub bot: Arc<FakeBot>,
    pub clock: Arc<ManualClock>,
}

/// Settings used by every test unless a test tweaks them
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.bot.token = "12345:test_token".to_string();
    settings.bot.authorized_users = vec![SUPER_ADMIN];
    settings.broadcast.send_interval_ms = 0;
    settings
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let pool = create_pool(&DatabaseConfig::in_memory())
            .await
            .expect("Failed to open in-memory database");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let bot = FakeBot::new();
        let clock = Arc::new(ManualClock::new(start_time()));
        let ctx = AppContext::new(
            settings,
            DatabaseService::new(pool),
            bot.clone(),
            clock.clone(),
            I18n::embedded().expect("Embedded translations must parse"),
            BotIdentity {
                id: BOT_ID,
                username: BOT_USERNAME.to_string(),
            },
        )
        .expect("Failed to build app context");

        Self { ctx, bot, clock }
    }

    pub async fn group(&self) -> Group {
        self.ctx
            .ensure_group(GROUP_ID, Some(GROUP_TITLE))
            .await
            .expect("Failed to create group")
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(Duration::seconds(seconds));
    }

    /// Store a user the way a private chat or group message would
    pub async fn known_user(&self, id: i64, username: Option<&str>, first_name: &str, started: bool) {
        self.ctx
            .db
            .users
            .upsert(
                UpsertUserRequest {
                    id,
                    username: username.map(str::to_string),
                    first_name: Some(first_name.to_string()),
                    last_name: None,
                    has_started_bot: Some(started),
                },
                self.now(),
            )
            .await
            .expect("Failed to store user");
    }
}

/// Profile with only a first name
pub fn profile(user_id: i64, first_name: &str) -> ProfileSnapshot {
    ProfileSnapshot {
        user_id,
        first_name: Some(first_name.to_string()),
        ..ProfileSnapshot::default()
    }
}

/// Profile whose bio advertises a channel
pub fn spam_profile(user_id: i64, first_name: &str) -> ProfileSnapshot {
    ProfileSnapshot {
        bio: Some("hot deals at t.me/spamdealsnow".to_string()),
        ..profile(user_id, first_name)
    }
}

/// A group message as the pipeline sees it
pub fn incoming(user_id: i64, first_name: &str, message_id: i32, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: GROUP_ID,
        message_id,
        sender: profile(user_id, first_name),
        text: Some(text.to_string()),
        entity_mentions: Vec::new(),
    }
}
