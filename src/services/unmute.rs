//! Self-service unmute and admin approval
//!
//! A muted user may ask to be unmuted once per cooldown. When a
//! verification channel is configured they must have joined it, and their
//! profile must be clean with the cache bypassed.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::database::DatabaseService;
use crate::middleware::auth::AuthMiddleware;
use crate::services::profile::{ProfileChecker, ProfileViolation};
use crate::services::punishment::PunishmentService;
use crate::services::telegram::BotApi;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{BotApiError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmuteOutcome {
    Unmuted,
    RateLimited { wait_seconds: u64 },
    NotInChannel { channel_link: Option<String> },
    ProfileIssue(ProfileViolation),
    /// The bot may not lift restrictions in this group
    NoPermission,
    /// The user is not in the group or not restricted
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApproveOutcome {
    Approved,
    ExemptedOnly { forbidden: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    NoChannel,
    Verified,
    NotMember { channel_link: Option<String> },
}

#[derive(Debug, Clone)]
pub struct UnmuteService {
    api: Arc<dyn BotApi>,
    db: DatabaseService,
    auth: AuthMiddleware,
    profiles: ProfileChecker,
    punishments: PunishmentService,
    clock: SharedClock,
    cooldown: Duration,
    configured_channel: Option<i64>,
}

impl UnmuteService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn BotApi>,
        db: DatabaseService,
        auth: AuthMiddleware,
        profiles: ProfileChecker,
        punishments: PunishmentService,
        clock: SharedClock,
        cooldown_seconds: u64,
        configured_channel: Option<i64>,
    ) -> Self {
        Self {
            api,
            db,
            auth,
            profiles,
            punishments,
            clock,
            cooldown: Duration::seconds(cooldown_seconds as i64),
            configured_channel,
        }
    }

    /// Channel set with `/setchannel`, else the configured one
    pub async fn verification_channel(&self) -> Result<Option<i64>> {
        Ok(self.db.verification_channel().await?.or(self.configured_channel))
    }

    /// Public link to a channel: its username link, else an invite link
    pub async fn channel_link(&self, channel_id: i64) -> Option<String> {
        if let Ok(info) = self.api.get_chat_info(channel_id).await {
            if let Some(username) = info.username {
                return Some(format!("https://t.me/{}", username));
            }
        }
        match self.api.export_invite_link(channel_id).await {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(channel_id, error = %e, "Could not get channel invite link");
                None
            }
        }
    }

    async fn is_channel_member(&self, channel_id: i64, user_id: i64) -> bool {
        match self.api.get_chat_member(channel_id, user_id).await {
            Ok(status) => status.is_present(),
            Err(e) => {
                warn!(channel_id, user_id, error = %e, "Channel membership lookup failed");
                false
            }
        }
    }

    /// Whether the user joined the verification channel
    pub async fn verify(&self, user_id: i64) -> Result<VerifyOutcome> {
        let Some(channel_id) = self.verification_channel().await? else {
            return Ok(VerifyOutcome::NoChannel);
        };
        if self.is_channel_member(channel_id, user_id).await {
            Ok(VerifyOutcome::Verified)
        } else {
            Ok(VerifyOutcome::NotMember {
                channel_link: self.channel_link(channel_id).await,
            })
        }
    }

    /// A user asks to be unmuted in a chat
    pub async fn request_unmute(&self, chat_id: i64, user_id: i64) -> Result<UnmuteOutcome> {
        let now = self.clock.now();

        if let Some(attempt) = self.db.admin.last_unmute_attempt(user_id, chat_id).await? {
            let elapsed = now - attempt.last_attempt_at;
            if elapsed < self.cooldown {
                let wait_seconds = (self.cooldown - elapsed).num_seconds().max(1) as u64;
                return Ok(UnmuteOutcome::RateLimited { wait_seconds });
            }
        }
        self.db.admin.record_unmute_attempt(user_id, chat_id, now).await?;

        if let Some(channel_id) = self.verification_channel().await? {
            if !self.is_channel_member(channel_id, user_id).await {
                return Ok(UnmuteOutcome::NotInChannel {
                    channel_link: self.channel_link(channel_id).await,
                });
            }
        }

        if let Some(violation) = self.profiles.check_user_fresh(user_id, None).await {
            return Ok(UnmuteOutcome::ProfileIssue(violation));
        }

        match self.punishments.lift(chat_id, user_id).await {
            Ok(()) => {
                info!(chat_id, user_id, "User unmuted themselves");
                Ok(UnmuteOutcome::Unmuted)
            }
            Err(BotApiError::Forbidden(_)) => Ok(UnmuteOutcome::NoPermission),
            Err(BotApiError::BadRequest(_)) => Ok(UnmuteOutcome::NotApplicable),
            Err(e) => Err(e.into()),
        }
    }

    /// An admin approves a user: exempt them here and lift restrictions
    pub async fn approve(&self, chat_id: i64, user_id: i64, admin_id: i64) -> Result<ApproveOutcome> {
        self.auth
            .set_group_exemption(chat_id, user_id, true, self.clock.now())
            .await?;
        self.profiles.forget(user_id);

        match self.punishments.lift(chat_id, user_id).await {
            Ok(()) => {
                info!(chat_id, user_id, admin_id, "User approved by admin");
                Ok(ApproveOutcome::Approved)
            }
            Err(BotApiError::Forbidden(_)) => Ok(ApproveOutcome::ExemptedOnly { forbidden: true }),
            Err(BotApiError::BadRequest(_)) => Ok(ApproveOutcome::ExemptedOnly { forbidden: false }),
            Err(e) => Err(e.into()),
        }
    }
}
