//! Profile checker
//!
//! Scans first name, last name, bio and username of a user, in that order.
//! Results are cached per user, clean ones included.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::middleware::cache::TtlCache;
use crate::models::{IssueType, ProfileField};
use crate::services::patterns::PatternSet;
use crate::services::telegram::{BotApi, ProfileSnapshot};

/// First problematic profile field of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileViolation {
    pub field: ProfileField,
    pub issue: IssueType,
}

#[derive(Debug, Clone)]
pub struct ProfileChecker {
    api: Arc<dyn BotApi>,
    patterns: Arc<PatternSet>,
    cache: TtlCache<i64, Option<ProfileViolation>>,
}

impl ProfileChecker {
    pub fn new(
        api: Arc<dyn BotApi>,
        patterns: Arc<PatternSet>,
        cache: TtlCache<i64, Option<ProfileViolation>>,
    ) -> Self {
        Self { api, patterns, cache }
    }

    /// Check the fields of a snapshot without touching the API or the cache
    pub fn check_snapshot(&self, profile: &ProfileSnapshot) -> Option<ProfileViolation> {
        ProfileField::CHECK_ORDER.iter().find_map(|&field| {
            let value = match field {
                ProfileField::FirstName => profile.first_name.as_deref(),
                ProfileField::LastName => profile.last_name.as_deref(),
                ProfileField::Bio => profile.bio.as_deref(),
                ProfileField::Username => profile.username.as_deref(),
            }?;
            if value.trim().is_empty() {
                return None;
            }
            self.patterns
                .check(value)
                .map(|issue| ProfileViolation { field, issue })
        })
    }

    /// Cached profile check. `fallback` carries the names known from the
    /// update and is checked when the profile cannot be fetched.
    pub async fn check_user(
        &self,
        user_id: i64,
        fallback: Option<&ProfileSnapshot>,
    ) -> Option<ProfileViolation> {
        if let Some(cached) = self.cache.get(&user_id) {
            debug!(user_id, "Profile check served from cache");
            return cached;
        }
        self.check_user_fresh(user_id, fallback).await
    }

    /// Profile check that bypasses the cache and refreshes it
    pub async fn check_user_fresh(
        &self,
        user_id: i64,
        fallback: Option<&ProfileSnapshot>,
    ) -> Option<ProfileViolation> {
        match self.api.get_user_profile(user_id).await {
            Ok(profile) => {
                let result = self.check_snapshot(&profile);
                self.cache.insert(user_id, result);
                result
            }
            Err(e) => {
                warn!(user_id, error = %e, "Could not fetch profile, checking known names only");
                fallback.and_then(|profile| self.check_snapshot(profile))
            }
        }
    }

    /// Fetch a profile for display, uncached
    pub async fn fetch_profile(&self, user_id: i64) -> crate::utils::errors::ApiResult<ProfileSnapshot> {
        self.api.get_user_profile(user_id).await
    }

    pub fn forget(&self, user_id: i64) {
        self.cache.remove(&user_id);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}
