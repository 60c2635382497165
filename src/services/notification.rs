//! Outgoing notifications
//!
//! Punishment notices with their bilingual dialogues, and paced bulk
//! delivery used by broadcasts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::i18n::{params, I18n};
use crate::models::{Button, CallbackAction, Keyboard, PunishAction};
use crate::services::telegram::{BotApi, SendOptions};
use crate::utils::errors::{ApiResult, BotApiError};
use crate::utils::helpers::{escape_html, format_duration, mention_html};

/// Verse appended to a punishment notice, in English and Hindi
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialogue {
    pub english: &'static str,
    pub hindi: &'static str,
}

pub const DIALOGUES: &[Dialogue] = &[
    Dialogue {
        english: "O reckless knave, thy bio doth betray!\nWith vile links that spread corruption’s seed.\nPurge this filth, or face our righteous wrath,\nFor purity we guard with iron will.",
        hindi: "हे लापरवाह दुष्ट, तेरा बायो धोखा देता!\nघृणित लिंक्स जो भ्रष्टाचार के बीज बोते।\nइस मैल को साफ कर, वरना हमारे धर्मी क्रोध का सामना कर,\nक्योंकि हम पवित्रता की रक्षा लौह इच्छा से करते हैं।",
    },
    Dialogue {
        english: "Fie upon thee, whose bio bears foul links,\nA herald of deceit and base intent.\nRemove these chains, or be cast out anon,\nOur group shall stand untainted and pure.",
        hindi: "धिक्कार है तुझ पर, जिसका बायो घृणित लिंक्स रखता,\nधोखे और नीच इरादों का संदेशवाहक।\nइन जंजीरों को हटाओ, नहीं तो जल्द बाहर फेंका जाओगे,\nहमारा समूह शुद्ध और निर्मल रहेगा।",
    },
    Dialogue {
        english: "O foul betrayer, thy bio doth proclaim\nA siren’s call to chaos and deceit.\nCut these ties, or suffer swift expulsion,\nFor here no villain’s shadow shall abide.",
        hindi: "हे घृणित धोखेबाज, तेरा बायो घोषणा करता है है\nअराजकता और छल का सायरन कॉल।\nइन बंधनों को काट, नहीं तो त्वरित निष्कासन सह,\nहमारा समूह शुद्ध और निर्मल रहेगा।",
    },
    Dialogue {
        english: "Thy bio, a plague upon our sacred trust,\nSpreading venom with each cursed link.\nCleanse thyself, or be forever shunned,\nFor purity’s sake, we cast thee out.",
        hindi: "तेरा बायो, हमारे पवित्र विश्वास पर प्लेग है,\nहर शापित लिंक से विष फैलाता।\nअपने आप को साफ कर, नहीं तो सदा के लिए बहिष्कृत हो,\nपवित्रता के लिए, हम तुझे बाहर फेंक देते हैं।",
    },
    Dialogue {
        english: "O knave, whose bio doth corrupt the pure,\nWith links that sow the seeds of ruin.\nPurge this filth, or face eternal scorn,\nOur sentinel shall guard this hallowed ground.",
        hindi: "हे दुष्ट, जिसका बायो शुद्ध को भ्रष्ट करता,\nऐसे लिंक्स जो विनाश के बीज बोते।\nइस मैल को साफ कर, नहीं तो सदा के लिए तिरस्कार सह,\nहमारा प्रहरी इस पवित्र भूमि की रक्षा करेगा।",
    },
    Dialogue {
        english: "Thou art a traitor, thy bio stained with lies,\nA serpent’s tongue that poisons all who read.\nBe cleansed, or be forever cast aside,\nFor here we tolerate no venomous creed.",
        hindi: "तू एक द्रोही है, तेरा बायो झूठ से दागदार,\nएक सांप की जीभ जो पढ़ने वालों को ज़हरीला बनाती।\nसाफ हो जा, नहीं तो सदा के लिए बाहर फेंक दिया जाएगा,\nक्योंकि यहाँ हम विषैले विश्वास को सहन नहीं करते।",
    },
    Dialogue {
        english: "Your personal scroll, the bio, now bears a mark of transgression, a tangled web of forbidden threads that threaten to ensnare the unwary.\nUntangle this digital deceit, or face the grim unraveling of your presence within these hallowed halls, forever banished from our sight.",
        hindi: "तुम्हारा व्यक्तिगत स्क्रॉल, बायो, अब उल्लंघन का एक निशान धारण करता है, वर्जित धागों का एक उलझा हुआ जाल जो असावधान को फंसाने की धमकी देता है।\nइस डिजिटल धोखे को सुलझाओ, या इन पवित्र हॉल के भीतर तुम्हारी उपस्थिति के भयावह बिखराव का सामना करो, हमारी दृष्टि से हमेशा के लिए निर्वासित।",
    },
    Dialogue {
        english: "Lo, a treacherous link has woven its way into the very fabric of thy bio, a venomous serpent lurking within our pristine digital garden.\nRemove this vile blight without delay, lest the righteous indignation of the guardians descend upon thee, casting thee forth into the desolate wastes of banishment.",
        hindi: "देखो, एक कपटी लिंक तुम्हारे बायो के ताने-बाने में बुना गया है, हमारे प्राचीन डिजिटल उद्यान के भीतर छिपा हुआ एक जहरीला सर्प।\nइस घृणित विपत्ति को बिना किसी देरी के हटाओ, कहीं संरक्षकों का धर्मी क्रोध तुम पर न उतर जाए, तुम्हें निर्वासन के उजाड़ रेगिस्तान में फेंकते हुए।",
    },
];

/// A random dialogue for a punishment notice
pub fn random_dialogue() -> &'static Dialogue {
    DIALOGUES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&DIALOGUES[0])
}

/// Punishment notice for a message sender or a joining user
#[derive(Debug, Clone)]
pub struct PunishmentNotice {
    pub chat_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub action: PunishAction,
    pub duration_seconds: u64,
    pub reason: String,
    pub reply_to: Option<i32>,
}

/// Result of a bulk send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub sent: usize,
    pub failed: usize,
    /// Chats that answered with "forbidden" (bot blocked, kicked or the chat is gone)
    pub forbidden: Vec<i64>,
}

/// Counters since startup
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationStats {
    pub total_sent: u64,
    pub total_failed: u64,
}

/// Renders and delivers bot notifications
#[derive(Debug, Clone)]
pub struct NotificationService {
    api: Arc<dyn BotApi>,
    i18n: Arc<I18n>,
    send_interval: Duration,
    stats: Arc<Mutex<NotificationStats>>,
}

impl NotificationService {
    pub fn new(api: Arc<dyn BotApi>, i18n: Arc<I18n>, send_interval: Duration) -> Self {
        Self {
            api,
            i18n,
            send_interval,
            stats: Arc::new(Mutex::new(NotificationStats::default())),
        }
    }

    /// Text of a punishment notice with the given dialogue
    pub fn punishment_text(&self, notice: &PunishmentNotice, dialogue: &Dialogue) -> String {
        let i18n = &self.i18n;
        let duration = format_duration(notice.duration_seconds);
        let action_taken = match notice.action {
            PunishAction::Mute => i18n.t("punishment.muted_for", "en", Some(&params([("duration", duration)]))),
            PunishAction::Kick => i18n.text("punishment.kicked"),
            PunishAction::Ban if notice.duration_seconds > 0 => {
                i18n.t("punishment.banned_for", "en", Some(&params([("duration", duration)])))
            }
            PunishAction::Ban => i18n.text("punishment.banned"),
        };

        i18n.t(
            "punishment.sender",
            "en",
            Some(&params([
                ("user_mention", mention_html(notice.user_id, &notice.user_name)),
                ("action_taken", action_taken),
                ("reason_detail", escape_html(&notice.reason)),
                ("dialogue", format!("\n<i>{}</i>\n\n<i>{}</i>", dialogue.english, dialogue.hindi)),
            ])),
        )
    }

    /// "Unmute me" and "Admin approve" buttons under a mute notice
    pub fn unmute_keyboard(&self, chat_id: i64, user_id: i64) -> Keyboard {
        Keyboard::new(vec![
            vec![Button::callback(
                self.i18n.text("punishment.unmute_button"),
                CallbackAction::Unmute { chat_id, user_id }.data(),
            )],
            vec![Button::callback(
                self.i18n.text("punishment.approve_button"),
                CallbackAction::Approve { chat_id, user_id }.data(),
            )],
        ])
    }

    /// Post the punishment notice in the group
    pub async fn send_punishment_notice(&self, notice: &PunishmentNotice) -> ApiResult<i32> {
        let text = self.punishment_text(notice, random_dialogue());
        let mut options = SendOptions::html().without_preview();
        if notice.action == PunishAction::Mute {
            options = options.with_keyboard(self.unmute_keyboard(notice.chat_id, notice.user_id));
        }
        if let Some(reply_to) = notice.reply_to {
            options = options.reply_to(reply_to);
        }
        self.send(notice.chat_id, &text, options).await
    }

    /// Post the notice about mentioned users that were muted
    pub async fn send_mention_notice(
        &self,
        chat_id: i64,
        sender_id: i64,
        sender_name: &str,
        muted: &[(i64, String)],
        duration_seconds: u64,
    ) -> ApiResult<i32> {
        let muted_list = muted
            .iter()
            .map(|(id, name)| mention_html(*id, name))
            .collect::<Vec<_>>()
            .join(", ");
        let text = self.i18n.t(
            "punishment.mentioned",
            "en",
            Some(&params([
                ("sender_mention", mention_html(sender_id, sender_name)),
                ("muted_users_list", muted_list),
                ("duration", format_duration(duration_seconds)),
            ])),
        );
        self.send(chat_id, &text, SendOptions::html().without_preview()).await
    }

    /// Send one message, keeping the counters
    pub async fn send(&self, chat_id: i64, text: &str, options: SendOptions) -> ApiResult<i32> {
        let result = self.api.send_message(chat_id, text, options).await;
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        match &result {
            Ok(_) => stats.total_sent += 1,
            Err(e) => {
                stats.total_failed += 1;
                debug!(chat_id, error = %e, "Notification not delivered");
            }
        }
        result
    }

    /// Send the same message to many chats, sleeping between sends
    pub async fn send_bulk(&self, chat_ids: &[i64], text: &str, options: &SendOptions) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for (index, &chat_id) in chat_ids.iter().enumerate() {
            if index > 0 && !self.send_interval.is_zero() {
                tokio::time::sleep(self.send_interval).await;
            }

            match self.send(chat_id, text, options.clone()).await {
                Ok(_) => outcome.sent += 1,
                Err(BotApiError::Forbidden(reason)) => {
                    warn!(chat_id, reason = %reason, "Bulk send forbidden");
                    outcome.failed += 1;
                    outcome.forbidden.push(chat_id);
                }
                Err(e) => {
                    warn!(chat_id, error = %e, "Bulk send failed");
                    outcome.failed += 1;
                }
            }
        }

        info!(
            total = chat_ids.len(),
            sent = outcome.sent,
            failed = outcome.failed,
            "Bulk notifications completed"
        );
        outcome
    }

    pub fn stats(&self) -> NotificationStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialogues_are_bilingual() {
        assert_eq!(DIALOGUES.len(), 8);
        assert!(DIALOGUES.iter().all(|d| !d.english.is_empty() && !d.hindi.is_empty()));
        assert!(DIALOGUES.contains(random_dialogue()));
    }
}
