//! Authorization middleware
//!
//! Role checks for commands and buttons, exemption lookups for the
//! moderation pipeline, and the command gates: maintenance mode, feature
//! flags and roles, in that order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::database::DatabaseService;
use crate::middleware::cache::TtlCache;
use crate::services::telegram::BotApi;
use crate::utils::errors::Result;

/// Features that can never be disabled
pub const CRITICAL_FEATURES: [&str; 3] = ["enable", "disable", "maintenance"];

/// Feature flag gating the moderation of group messages
pub const MESSAGE_PROCESSING_FEATURE: &str = "message_processing";

/// Key of the persisted maintenance flag in `bot_settings`
pub const MAINTENANCE_SETTING_KEY: &str = "maintenance_mode";

/// Who may run a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Everyone,
    /// Chat administrator, in a group
    GroupAdmin,
    SuperAdmin,
}

/// Outcome of the command gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allowed,
    Maintenance,
    FeatureDisabled,
    GroupOnly,
    NotGroupAdmin,
    NotSuperAdmin,
}

impl Gate {
    /// Translation key of the refusal message
    pub fn message_key(&self) -> Option<&'static str> {
        match self {
            Gate::Allowed => None,
            Gate::Maintenance => Some("gates.maintenance"),
            Gate::FeatureDisabled => Some("gates.feature_disabled"),
            Gate::GroupOnly => Some("gates.group_only"),
            Gate::NotGroupAdmin => Some("gates.admin_only"),
            Gate::NotSuperAdmin => Some("gates.super_admin_only"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    super_admins: Arc<Vec<i64>>,
    api: Arc<dyn BotApi>,
    db: DatabaseService,
    maintenance: Arc<AtomicBool>,
    admin_cache: TtlCache<(i64, i64), bool>,
    exemption_cache: TtlCache<(i64, i64), bool>,
}

impl AuthMiddleware {
    pub fn new(
        super_admins: Vec<i64>,
        api: Arc<dyn BotApi>,
        db: DatabaseService,
        admin_cache: TtlCache<(i64, i64), bool>,
        exemption_cache: TtlCache<(i64, i64), bool>,
    ) -> Self {
        Self {
            super_admins: Arc::new(super_admins),
            api,
            db,
            maintenance: Arc::new(AtomicBool::new(false)),
            admin_cache,
            exemption_cache,
        }
    }

    pub fn is_super_admin(&self, user_id: i64) -> bool {
        self.super_admins.contains(&user_id)
    }

    pub fn maintenance(&self) -> bool {
        self.maintenance.load(Ordering::SeqCst)
    }

    pub fn set_maintenance(&self, on: bool) {
        self.maintenance.store(on, Ordering::SeqCst);
    }

    /// Turn maintenance mode on or off and persist it across restarts
    pub async fn switch_maintenance(&self, on: bool) -> Result<()> {
        let value = if on { "on" } else { "off" };
        self.db.admin.set_setting(MAINTENANCE_SETTING_KEY, value).await?;
        self.set_maintenance(on);
        Ok(())
    }

    /// Load the persisted maintenance flag
    pub async fn restore_maintenance(&self) -> Result<bool> {
        let on = self.db.admin.get_setting(MAINTENANCE_SETTING_KEY).await?.as_deref() == Some("on");
        self.set_maintenance(on);
        Ok(on)
    }

    /// Owner or administrator of the chat. Super admins always pass.
    /// Lookup failures count as "not an admin" and are not cached.
    pub async fn is_chat_admin(&self, chat_id: i64, user_id: i64) -> bool {
        if self.is_super_admin(user_id) {
            return true;
        }
        if let Some(is_admin) = self.admin_cache.get(&(chat_id, user_id)) {
            return is_admin;
        }

        match self.api.get_chat_member(chat_id, user_id).await {
            Ok(status) => {
                let is_admin = status.is_admin();
                self.admin_cache.insert((chat_id, user_id), is_admin);
                is_admin
            }
            Err(e) => {
                warn!(chat_id, user_id, error = %e, "Admin status lookup failed");
                false
            }
        }
    }

    /// Exempt in this group or globally
    pub async fn is_exempt(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        if let Some(exempt) = self.exemption_cache.get(&(chat_id, user_id)) {
            return Ok(exempt);
        }

        let exempt = self.db.moderation.is_globally_exempt(user_id).await?
            || self.db.moderation.is_group_exempt(chat_id, user_id).await?;
        self.exemption_cache.insert((chat_id, user_id), exempt);
        Ok(exempt)
    }

    /// Add or remove a per-group exemption. Returns whether anything changed.
    pub async fn set_group_exemption(
        &self,
        chat_id: i64,
        user_id: i64,
        exempt: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = if exempt {
            self.db.moderation.add_group_exemption(chat_id, user_id, now).await?
        } else {
            self.db.moderation.remove_group_exemption(chat_id, user_id).await?
        };
        self.exemption_cache.remove(&(chat_id, user_id));
        debug!(chat_id, user_id, exempt, changed, "Group exemption updated");
        Ok(changed)
    }

    /// Add or remove a global exemption. Returns whether anything changed.
    pub async fn set_global_exemption(
        &self,
        user_id: i64,
        exempt: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = if exempt {
            self.db.moderation.add_global_exemption(user_id, now).await?
        } else {
            self.db.moderation.remove_global_exemption(user_id).await?
        };
        // cached per chat, so every entry of this user may be stale
        self.exemption_cache.clear();
        debug!(user_id, exempt, changed, "Global exemption updated");
        Ok(changed)
    }

    /// Run the gates of a command
    pub async fn check_command(
        &self,
        command: &str,
        role: Role,
        user_id: i64,
        group_chat: Option<i64>,
    ) -> Result<Gate> {
        let super_admin = self.is_super_admin(user_id);

        if self.maintenance() && !super_admin {
            return Ok(Gate::Maintenance);
        }

        if !CRITICAL_FEATURES.contains(&command) && !self.db.admin.is_feature_enabled(command).await? {
            return Ok(Gate::FeatureDisabled);
        }

        let gate = match role {
            Role::Everyone => Gate::Allowed,
            Role::SuperAdmin if super_admin => Gate::Allowed,
            Role::SuperAdmin => Gate::NotSuperAdmin,
            Role::GroupAdmin => match group_chat {
                None => Gate::GroupOnly,
                Some(chat_id) if self.is_chat_admin(chat_id, user_id).await => Gate::Allowed,
                Some(_) => Gate::NotGroupAdmin,
            },
        };
        Ok(gate)
    }

    /// Whether group messages should be moderated right now
    pub async fn message_processing_enabled(&self) -> Result<bool> {
        if self.maintenance() {
            return Ok(false);
        }
        self.db.admin.is_feature_enabled(MESSAGE_PROCESSING_FEATURE).await
    }

    pub fn admin_cache_len(&self) -> usize {
        self.admin_cache.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.admin_cache.purge_expired() + self.exemption_cache.purge_expired()
    }

    pub fn clear_caches(&self) -> usize {
        self.admin_cache.clear() + self.exemption_cache.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_messages() {
        assert_eq!(Gate::Allowed.message_key(), None);
        assert_eq!(Gate::Maintenance.message_key(), Some("gates.maintenance"));
        assert_eq!(Gate::NotSuperAdmin.message_key(), Some("gates.super_admin_only"));
    }

    #[test]
    fn test_critical_features() {
        assert!(CRITICAL_FEATURES.contains(&"maintenance"));
        assert!(!CRITICAL_FEATURES.contains(&"checkbio"));
    }
}
