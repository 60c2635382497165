//! Services module
//!
//! Business logic of the bot and the [`AppContext`] that wires it together.

pub mod broadcast;
pub mod mentions;
pub mod moderation;
pub mod notification;
pub mod patterns;
pub mod profile;
pub mod punishment;
pub mod telegram;
pub mod unmute;

pub use broadcast::{BroadcastReport, BroadcastService};
pub use mentions::{MentionAnalysis, MentionAnalyzer, RawMention};
pub use moderation::{Decision, IncomingMessage, ModerationOutcome, ModerationService};
pub use notification::{BulkOutcome, NotificationService, PunishmentNotice};
pub use patterns::PatternSet;
pub use profile::{ProfileChecker, ProfileViolation};
pub use punishment::{PunishmentOutcome, PunishmentRequest, PunishmentService, UnmuteAllReport};
pub use telegram::{BotApi, BotIdentity, MemberStatus, ProfileSnapshot, SendOptions, TelegramBot};
pub use unmute::{ApproveOutcome, UnmuteOutcome, UnmuteService, VerifyOutcome};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::cache::{Debouncer, TtlCache};
use crate::models::Group;
use crate::utils::clock::SharedClock;
use crate::utils::errors::Result;

/// Everything a handler needs, built once at startup
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub db: DatabaseService,
    pub api: Arc<dyn BotApi>,
    pub clock: SharedClock,
    pub i18n: Arc<I18n>,
    pub bot: BotIdentity,
    pub auth: AuthMiddleware,
    pub notifier: NotificationService,
    pub moderation: ModerationService,
    pub unmute: UnmuteService,
    pub broadcasts: BroadcastService,
    pub started_at: DateTime<Utc>,
}

/// Entries removed by one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cache_entries: usize,
    pub bad_actors: u64,
}

/// Sizes shown by `/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSizes {
    pub profiles: usize,
    pub usernames: usize,
    pub admins: usize,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        db: DatabaseService,
        api: Arc<dyn BotApi>,
        clock: SharedClock,
        i18n: I18n,
        bot: BotIdentity,
    ) -> Result<Self> {
        let cache = &settings.cache;
        let i18n = Arc::new(i18n);
        let patterns = Arc::new(PatternSet::new(settings.punishment.min_username_length)?);

        let profiles = ProfileChecker::new(
            api.clone(),
            patterns.clone(),
            TtlCache::new("profile", cache.profile_ttl_seconds, cache.max_entries, clock.clone()),
        );
        let mentions = MentionAnalyzer::new(
            db.users.clone(),
            profiles.clone(),
            TtlCache::new("username", cache.username_ttl_seconds, cache.max_entries, clock.clone()),
            settings.punishment.max_mentions_per_message,
        )?;
        let auth = AuthMiddleware::new(
            settings.bot.authorized_users.clone(),
            api.clone(),
            db.clone(),
            TtlCache::new("admin", cache.admin_ttl_seconds, cache.max_entries, clock.clone()),
            TtlCache::new("exemption", cache.exemption_ttl_seconds, cache.max_entries, clock.clone()),
        );
        let notifier = NotificationService::new(
            api.clone(),
            i18n.clone(),
            Duration::from_millis(settings.broadcast.send_interval_ms),
        );
        let punishments = PunishmentService::new(
            api.clone(),
            db.clone(),
            notifier.clone(),
            Debouncer::new(cache.debounce_seconds, cache.max_entries, clock.clone()),
            clock.clone(),
        );
        let unmute = UnmuteService::new(
            api.clone(),
            db.clone(),
            auth.clone(),
            profiles.clone(),
            punishments.clone(),
            clock.clone(),
            settings.unmute.cooldown_seconds,
            settings.bot.channel_id,
        );
        let moderation = ModerationService::new(
            db.clone(),
            patterns,
            mentions,
            punishments,
            i18n.clone(),
            clock.clone(),
        );
        let broadcasts = BroadcastService::new(db.clone(), notifier.clone(), clock.clone());

        Ok(Self {
            started_at: clock.now(),
            settings: Arc::new(settings),
            db,
            api,
            clock,
            i18n,
            bot,
            auth,
            notifier,
            moderation,
            unmute,
            broadcasts,
        })
    }

    /// Group row for a chat, created with the configured defaults
    pub async fn ensure_group(&self, chat_id: i64, title: Option<&str>) -> Result<Group> {
        self.db
            .ensure_group(chat_id, title, &self.settings.group_defaults(), self.clock.now())
            .await
    }

    pub fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            profiles: self.moderation.profiles().cache_len(),
            usernames: self.moderation.mentions().cache_len(),
            admins: self.auth.admin_cache_len(),
        }
    }

    /// Empty the profile and username caches. Returns (profiles, usernames).
    pub fn clear_caches(&self) -> (usize, usize) {
        let profiles = self.moderation.profiles().clear_cache();
        let usernames = self.moderation.mentions().clear_cache();
        self.auth.clear_caches();
        (profiles, usernames)
    }

    /// Purge expired cache entries and expired bad actors
    pub async fn run_cleanup(&self) -> Result<CleanupReport> {
        let cache_entries = self.moderation.profiles().purge_expired()
            + self.moderation.mentions().purge_expired()
            + self.moderation.punishments().purge_expired()
            + self.auth.purge_expired();
        let bad_actors = self.db.cleanup_expired_data(self.clock.now()).await?;
        Ok(CleanupReport {
            cache_entries,
            bad_actors,
        })
    }

    /// Periodic cleanup task
    pub fn spawn_cleanup_job(&self) -> JoinHandle<()> {
        let context = self.clone();
        let period = Duration::from_secs(self.settings.cache.cleanup_interval_seconds.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match context.run_cleanup().await {
                    Ok(report) => info!(
                        cache_entries = report.cache_entries,
                        bad_actors = report.bad_actors,
                        "Cleanup finished"
                    ),
                    Err(e) => error!(error = %e, "Cleanup failed"),
                }
            }
        })
    }

    pub fn uptime(&self) -> chrono::Duration {
        self.clock.now() - self.started_at
    }
}
