//! Mention analyzer
//!
//! Collects the users a message mentions, resolves usernames through the
//! known-users table and profile-checks each of them.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::UserRepository;
use crate::middleware::cache::TtlCache;
use crate::services::profile::{ProfileChecker, ProfileViolation};
use crate::services::telegram::ProfileSnapshot;

/// A mention as it appears in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMention {
    /// `@name`, from a `mention` entity or the text itself
    Username(String),
    /// `text_mention` entity, which carries the user
    TextMention { user_id: i64, first_name: String },
}

impl RawMention {
    fn dedup_key(&self) -> String {
        match self {
            RawMention::Username(name) => name.trim_start_matches('@').to_lowercase(),
            RawMention::TextMention { user_id, .. } => format!("#{}", user_id),
        }
    }
}

/// Mentioned user with a problematic profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentionViolator {
    pub user_id: i64,
    pub display: String,
    pub violation: ProfileViolation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MentionAnalysis {
    /// Distinct mentions in the message
    pub mention_count: usize,
    /// More distinct mentions than allowed
    pub excessive: bool,
    pub violators: Vec<MentionViolator>,
}

impl MentionAnalysis {
    /// `@alice (bio: forbidden_link), @bob (username: forbidden_word)`
    pub fn summary(&self) -> String {
        summarize(&self.violators)
    }
}

/// One line listing violators with their first bad field
pub fn summarize(violators: &[MentionViolator]) -> String {
    violators
        .iter()
        .map(|v| format!("{} ({}: {})", v.display, v.violation.field, v.violation.issue))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds `@word` handles in message text
#[derive(Debug, Clone)]
pub struct MentionExtractor {
    handle: Regex,
}

impl MentionExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            handle: Regex::new(r"@([A-Za-z0-9_]{5,32})")?,
        })
    }

    /// Entity mentions plus `@word` matches in the text, deduplicated
    /// case-insensitively, in order of first appearance
    pub fn extract(&self, text: &str, entity_mentions: Vec<RawMention>) -> Vec<RawMention> {
        let from_text = self
            .handle
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| RawMention::Username(m.as_str().to_string()));

        let mut seen = HashSet::new();
        entity_mentions
            .into_iter()
            .map(|mention| match mention {
                RawMention::Username(name) => RawMention::Username(name.trim_start_matches('@').to_string()),
                other => other,
            })
            .chain(from_text)
            .filter(|mention| seen.insert(mention.dedup_key()))
            .collect()
    }
}

fn looks_like_bot(username: &str) -> bool {
    username.to_lowercase().ends_with("bot")
}

#[derive(Debug, Clone)]
pub struct MentionAnalyzer {
    extractor: MentionExtractor,
    users: UserRepository,
    profiles: ProfileChecker,
    usernames: TtlCache<String, i64>,
    max_mentions: usize,
}

impl MentionAnalyzer {
    pub fn new(
        users: UserRepository,
        profiles: ProfileChecker,
        usernames: TtlCache<String, i64>,
        max_mentions: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            extractor: MentionExtractor::new()?,
            users,
            profiles,
            usernames,
            max_mentions,
        })
    }

    pub fn extract(&self, text: &str, entity_mentions: Vec<RawMention>) -> Vec<RawMention> {
        self.extractor.extract(text, entity_mentions)
    }

    /// User id behind a username, from the cache or the known-users table
    pub async fn resolve_username(&self, username: &str) -> Option<i64> {
        let key = username.trim_start_matches('@').to_lowercase();
        if let Some(id) = self.usernames.get(&key) {
            return Some(id);
        }

        match self.users.find_by_username(&key).await {
            Ok(Some(user)) => {
                self.usernames.insert(key, user.id);
                Some(user.id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(username = %key, error = %e, "Username lookup failed");
                None
            }
        }
    }

    /// Analyze the mentions of a message sent by `sender_id`
    pub async fn analyze(&self, sender_id: i64, mentions: &[RawMention]) -> MentionAnalysis {
        let mut analysis = MentionAnalysis {
            mention_count: mentions.len(),
            excessive: mentions.len() > self.max_mentions,
            violators: Vec::new(),
        };

        let mut checked = HashSet::new();
        for mention in mentions {
            let (user_id, display, fallback) = match mention {
                RawMention::Username(name) => {
                    if looks_like_bot(name) {
                        debug!(username = %name, "Skipping bot mention");
                        continue;
                    }
                    let Some(user_id) = self.resolve_username(name).await else {
                        debug!(username = %name, "Skipping unresolvable mention");
                        continue;
                    };
                    let known = self.users.find_by_id(user_id).await.ok().flatten();
                    let fallback = known.map(|user| ProfileSnapshot {
                        user_id,
                        first_name: user.first_name,
                        last_name: user.last_name,
                        username: user.username,
                        bio: None,
                    });
                    (user_id, format!("@{}", name), fallback)
                }
                RawMention::TextMention { user_id, first_name } => (
                    *user_id,
                    first_name.clone(),
                    Some(ProfileSnapshot {
                        user_id: *user_id,
                        first_name: Some(first_name.clone()),
                        ..ProfileSnapshot::default()
                    }),
                ),
            };

            if user_id == sender_id || !checked.insert(user_id) {
                continue;
            }

            if let Some(violation) = self.profiles.check_user(user_id, fallback.as_ref()).await {
                analysis.violators.push(MentionViolator {
                    user_id,
                    display,
                    violation,
                });
            }
        }

        analysis
    }

    pub fn cache_len(&self) -> usize {
        self.usernames.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.usernames.purge_expired()
    }

    pub fn clear_cache(&self) -> usize {
        self.usernames.clear()
    }

    pub fn profiles(&self) -> &ProfileChecker {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_dedupes_case_insensitively() {
        let entities = vec![
            RawMention::Username("@Alice_1".to_string()),
            RawMention::TextMention {
                user_id: 42,
                first_name: "Bob".to_string(),
            },
        ];
        let mentions = MentionExtractor::new().unwrap().extract("hi @alice_1 and @charlie and @CHARLIE", entities);
        assert_eq!(
            mentions,
            vec![
                RawMention::Username("Alice_1".to_string()),
                RawMention::TextMention {
                    user_id: 42,
                    first_name: "Bob".to_string()
                },
                RawMention::Username("charlie".to_string()),
            ]
        );
    }

    #[test]
    fn test_short_handles_are_ignored_by_text_scan() {
        let extractor = MentionExtractor::new().unwrap();
        assert!(extractor.extract("ping @abc", Vec::new()).is_empty());
        assert_eq!(extractor.extract("ping @abcdef", Vec::new()).len(), 1);
    }

    #[test]
    fn test_bot_suffix() {
        assert!(looks_like_bot("SpamBot"));
        assert!(looks_like_bot("helper_bot"));
        assert!(!looks_like_bot("robotics_fan"));
    }

    #[test]
    fn test_summary() {
        let analysis = MentionAnalysis {
            mention_count: 1,
            excessive: false,
            violators: vec![MentionViolator {
                user_id: 1,
                display: "@spammer".to_string(),
                violation: ProfileViolation {
                    field: crate::models::ProfileField::Bio,
                    issue: crate::models::IssueType::ForbiddenLink,
                },
            }],
        };
        assert_eq!(analysis.summary(), "@spammer (bio: forbidden_link)");
    }
}
