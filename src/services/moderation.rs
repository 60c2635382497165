//! Moderation decision pipeline
//!
//! Combines the bad actor table, the sender's profile, the message content
//! and the profiles of mentioned users into one [`Decision`], then hands it
//! to the [`PunishmentService`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::database::DatabaseService;
use crate::i18n::{params, I18n};
use crate::models::{Group, IssueType, TriggerType};
use crate::services::mentions::{summarize, MentionAnalyzer, MentionViolator, RawMention};
use crate::services::patterns::PatternSet;
use crate::services::profile::{ProfileChecker, ProfileViolation};
use crate::services::punishment::{PunishmentOutcome, PunishmentRequest, PunishmentService};
use crate::services::telegram::ProfileSnapshot;
use crate::utils::clock::SharedClock;
use crate::utils::errors::Result;

/// A group message as seen by the pipeline
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i32,
    /// Names of the sender as carried by the update
    pub sender: ProfileSnapshot,
    /// Text or caption
    pub text: Option<String>,
    pub entity_mentions: Vec<RawMention>,
}

impl IncomingMessage {
    pub fn sender_name(&self) -> String {
        display_name(&self.sender)
    }
}

/// Name to show for a profile
pub fn display_name(profile: &ProfileSnapshot) -> String {
    match (&profile.first_name, &profile.last_name) {
        (Some(first), Some(last)) => format!("{} {}", first, last),
        (Some(first), None) => first.clone(),
        (None, Some(last)) => last.clone(),
        (None, None) => profile
            .username
            .clone()
            .unwrap_or_else(|| profile.user_id.to_string()),
    }
}

/// What the pipeline found in a message
#[derive(Debug, Clone, Default, Serialize)]
pub struct Decision {
    pub reasons: Vec<String>,
    /// Set when the sender is to be punished
    pub trigger: Option<TriggerType>,
    pub sender_is_bad_actor: bool,
    pub sender_violation: Option<ProfileViolation>,
    pub message_issue: Option<IssueType>,
    pub mention_violators: Vec<MentionViolator>,
}

impl Decision {
    pub fn is_clean(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Only mentioned users are at fault
    pub fn mentions_only(&self) -> bool {
        self.trigger.is_none() && !self.mention_violators.is_empty()
    }

    pub fn reason_text(&self) -> String {
        self.reasons.join("; ")
    }
}

/// What was done about a message
#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub decision: Decision,
    pub message_deleted: bool,
    pub sender_punished: bool,
    pub mentioned_muted: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct ModerationService {
    db: DatabaseService,
    patterns: Arc<PatternSet>,
    profiles: ProfileChecker,
    mentions: MentionAnalyzer,
    punishments: PunishmentService,
    i18n: Arc<I18n>,
    clock: SharedClock,
}

impl ModerationService {
    pub fn new(
        db: DatabaseService,
        patterns: Arc<PatternSet>,
        mentions: MentionAnalyzer,
        punishments: PunishmentService,
        i18n: Arc<I18n>,
        clock: SharedClock,
    ) -> Self {
        Self {
            db,
            patterns,
            profiles: mentions.profiles().clone(),
            mentions,
            punishments,
            i18n,
            clock,
        }
    }

    fn reason(&self, key: &str, pairs: &[(&str, String)]) -> String {
        let p = params(pairs.iter().cloned());
        self.i18n.t(key, "en", Some(&p))
    }

    /// Evaluate a message without acting on it
    pub async fn evaluate(&self, message: &IncomingMessage) -> Result<Decision> {
        let mut decision = Decision::default();
        let user_id = message.sender.user_id;

        if self
            .db
            .is_bad_actor(user_id, message.chat_id, self.clock.now())
            .await?
        {
            decision.sender_is_bad_actor = true;
            decision.reasons.push(self.i18n.text("reasons.bad_actor"));
            decision.trigger = Some(TriggerType::Profile);
        }

        if let Some(violation) = self.profiles.check_user(user_id, Some(&message.sender)).await {
            decision.sender_violation = Some(violation);
            decision.reasons.push(self.reason(
                "reasons.sender_profile",
                &[
                    ("field", violation.field.to_string()),
                    ("issue_type", violation.issue.to_string()),
                ],
            ));
            decision.trigger.get_or_insert(TriggerType::Profile);
        }

        let text = message.text.as_deref().unwrap_or_default();
        let mentions = self.mentions.extract(text, message.entity_mentions.clone());
        let analysis = self.mentions.analyze(user_id, &mentions).await;

        let content_issue = if analysis.excessive {
            Some(IssueType::ExcessiveMentions)
        } else if text.trim().is_empty() {
            None
        } else {
            self.patterns.check(text)
        };
        if let Some(issue) = content_issue {
            decision.message_issue = Some(issue);
            decision.reasons.push(self.reason(
                "reasons.message",
                &[("issue_type", issue.to_string())],
            ));
            decision.trigger.get_or_insert(TriggerType::Message);
        }

        if !analysis.violators.is_empty() {
            decision.reasons.push(self.reason(
                "reasons.mentioned_profile",
                &[("summary", analysis.summary())],
            ));
            decision.mention_violators = analysis.violators;
        }

        debug!(
            chat_id = message.chat_id,
            user_id,
            mentions = analysis.mention_count,
            reasons = decision.reasons.len(),
            "Message evaluated"
        );
        Ok(decision)
    }

    /// Evaluate a message and act on the findings
    pub async fn moderate_message(&self, group: &Group, message: &IncomingMessage) -> Result<ModerationOutcome> {
        let decision = self.evaluate(message).await?;
        let mut outcome = ModerationOutcome {
            decision,
            message_deleted: false,
            sender_punished: false,
            mentioned_muted: Vec::new(),
        };
        if outcome.decision.is_clean() {
            return Ok(outcome);
        }

        outcome.message_deleted = self
            .punishments
            .delete_message(message.chat_id, message.message_id)
            .await;

        let sender_name = message.sender_name();

        if let Some(trigger) = outcome.decision.trigger {
            let request = PunishmentRequest {
                user_id: message.sender.user_id,
                user_name: sender_name.clone(),
                trigger,
                reason: outcome.decision.reason_text(),
                reply_to: None,
            };
            let result = self.punishments.punish(group, &request).await?;
            outcome.sender_punished = matches!(result, PunishmentOutcome::Applied { .. });
            if result == PunishmentOutcome::GroupGone {
                return Ok(outcome);
            }
        }

        if !outcome.decision.mention_violators.is_empty() {
            let mentioned: Vec<(i64, String)> = outcome
                .decision
                .mention_violators
                .iter()
                .map(|v| (v.user_id, v.display.clone()))
                .collect();
            let reason = self.reason(
                "reasons.mentioned_profile",
                &[("summary", summarize(&outcome.decision.mention_violators))],
            );
            outcome.mentioned_muted = self
                .punishments
                .mute_mentioned(group, message.sender.user_id, &sender_name, &mentioned, &reason)
                .await?;
        }

        info!(
            chat_id = message.chat_id,
            user_id = message.sender.user_id,
            trigger = ?outcome.decision.trigger,
            deleted = outcome.message_deleted,
            sender_punished = outcome.sender_punished,
            mentioned_muted = outcome.mentioned_muted.len(),
            "Message moderated"
        );
        Ok(outcome)
    }

    /// Profile-check a user who just joined and punish on a hit
    pub async fn moderate_new_member(
        &self,
        group: &Group,
        member: &ProfileSnapshot,
    ) -> Result<Option<PunishmentOutcome>> {
        let Some(violation) = self.profiles.check_user(member.user_id, Some(member)).await else {
            return Ok(None);
        };

        let request = PunishmentRequest {
            user_id: member.user_id,
            user_name: display_name(member),
            trigger: TriggerType::Profile,
            reason: self.reason(
                "reasons.new_user_profile",
                &[
                    ("field", violation.field.to_string()),
                    ("issue_type", violation.issue.to_string()),
                ],
            ),
            reply_to: None,
        };
        self.punishments.punish(group, &request).await.map(Some)
    }

    pub fn profiles(&self) -> &ProfileChecker {
        &self.profiles
    }

    pub fn mentions(&self) -> &MentionAnalyzer {
        &self.mentions
    }

    pub fn punishments(&self) -> &PunishmentService {
        &self.punishments
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut profile = ProfileSnapshot {
            user_id: 7,
            ..ProfileSnapshot::default()
        };
        assert_eq!(display_name(&profile), "7");
        profile.username = Some("knight".to_string());
        assert_eq!(display_name(&profile), "knight");
        profile.first_name = Some("Sir".to_string());
        profile.last_name = Some("Galahad".to_string());
        assert_eq!(display_name(&profile), "Sir Galahad");
    }

    #[test]
    fn test_mentions_only_decision() {
        let decision = Decision {
            reasons: vec!["x".to_string()],
            mention_violators: vec![MentionViolator {
                user_id: 1,
                display: "@a".to_string(),
                violation: ProfileViolation {
                    field: crate::models::ProfileField::Bio,
                    issue: IssueType::ForbiddenLink,
                },
            }],
            ..Decision::default()
        };
        assert!(decision.mentions_only());
        assert!(!decision.is_clean());
    }
}
