//! Broadcasts and timed broadcast jobs
//!
//! One-off broadcasts go to known groups, to users who started the bot, or
//! to a single chat. Repeating broadcasts are persisted as
//! [`TimedBroadcast`] rows, run as background tasks and restored at
//! startup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::database::DatabaseService;
use crate::models::{BroadcastTarget, Keyboard, TimedBroadcast};
use crate::services::notification::{BulkOutcome, NotificationService};
use crate::services::telegram::SendOptions;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{Result, SentinelError};
use crate::utils::helpers::{checked_after, MAX_DURATION_SECONDS};

/// Outcome of one broadcast, split by audience
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub groups: BulkOutcome,
    pub users: BulkOutcome,
}

impl BroadcastReport {
    pub fn sent(&self) -> usize {
        self.groups.sent + self.users.sent
    }

    pub fn failed(&self) -> usize {
        self.groups.failed + self.users.failed
    }
}

fn html_tag() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"(?i)</?(b|strong|i|em|u|ins|s|strike|del|a|code|pre|tg-spoiler|blockquote)(\s[^>]*)?>").ok()
    })
    .as_ref()
}

/// Messages that carry HTML tags are sent with HTML parse mode
pub fn detect_html(text: &str) -> bool {
    html_tag().is_some_and(|re| re.is_match(text))
}

/// Name for a new timed broadcast
pub fn new_job_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..8])
}

#[derive(Debug, Clone)]
pub struct BroadcastService {
    db: DatabaseService,
    notifier: NotificationService,
    clock: SharedClock,
    jobs: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl BroadcastService {
    pub fn new(db: DatabaseService, notifier: NotificationService, clock: SharedClock) -> Self {
        Self {
            db,
            notifier,
            clock,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn options(text: &str, keyboard: Option<&Keyboard>) -> SendOptions {
        let mut options = if detect_html(text) {
            SendOptions::html()
        } else {
            SendOptions::default()
        };
        if let Some(keyboard) = keyboard {
            options = options.with_keyboard(keyboard.clone());
        }
        options
    }

    async fn send_to_groups(&self, group_ids: &[i64], text: &str, options: &SendOptions) -> Result<BulkOutcome> {
        let outcome = self.notifier.send_bulk(group_ids, text, options).await;
        for group_id in &outcome.forbidden {
            self.db.forget_group(*group_id).await?;
        }
        Ok(outcome)
    }

    async fn send_to_users(&self, user_ids: &[i64], text: &str, options: &SendOptions) -> Result<BulkOutcome> {
        let outcome = self.notifier.send_bulk(user_ids, text, options).await;
        for user_id in &outcome.forbidden {
            self.db.users.set_started(*user_id, false).await?;
        }
        Ok(outcome)
    }

    /// Send a message to a target audience. Groups that forbid the bot
    /// are forgotten; users who blocked it lose their started flag.
    pub async fn broadcast(
        &self,
        target: BroadcastTarget,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<BroadcastReport> {
        let options = Self::options(text, keyboard);
        let mut report = BroadcastReport::default();

        match target {
            BroadcastTarget::Groups => {
                let groups = self.db.groups.list_ids().await?;
                report.groups = self.send_to_groups(&groups, text, &options).await?;
            }
            BroadcastTarget::Users => {
                let users = self.db.users.started_user_ids().await?;
                report.users = self.send_to_users(&users, text, &options).await?;
            }
            BroadcastTarget::Everyone => {
                let groups = self.db.groups.list_ids().await?;
                report.groups = self.send_to_groups(&groups, text, &options).await?;
                let users = self.db.users.started_user_ids().await?;
                report.users = self.send_to_users(&users, text, &options).await?;
            }
            BroadcastTarget::Chat(chat_id) if chat_id < 0 => {
                report.groups = self.send_to_groups(&[chat_id], text, &options).await?;
            }
            BroadcastTarget::Chat(chat_id) => {
                report.users = self.send_to_users(&[chat_id], text, &options).await?;
            }
        }

        info!(
            target = %target,
            sent = report.sent(),
            failed = report.failed(),
            "Broadcast finished"
        );
        Ok(report)
    }

    /// Persist a repeating broadcast and start it. The first run happens
    /// one interval from now.
    pub async fn schedule(
        &self,
        job_name: String,
        target: BroadcastTarget,
        text: String,
        interval_seconds: u64,
        keyboard: Option<&Keyboard>,
    ) -> Result<TimedBroadcast> {
        if interval_seconds == 0 || interval_seconds > MAX_DURATION_SECONDS {
            return Err(SentinelError::InvalidInput(format!(
                "broadcast interval must be between 1 and {} seconds",
                MAX_DURATION_SECONDS
            )));
        }
        let next_run_at = checked_after(self.clock.now(), interval_seconds).ok_or_else(|| {
            SentinelError::InvalidInput("broadcast interval is out of range".to_string())
        })?;

        let job = TimedBroadcast {
            job_name,
            target_type: target.to_string(),
            message_text: text,
            interval_seconds: interval_seconds as i64,
            next_run_at,
            markup_json: keyboard.map(serde_json::to_string).transpose()?,
        };
        self.db.admin.upsert_timed_broadcast(&job).await?;
        self.spawn_job(job.clone());
        Ok(job)
    }

    /// Start the tasks of every persisted job
    pub async fn restore_jobs(&self) -> Result<usize> {
        let jobs = self.db.admin.list_timed_broadcasts().await?;
        let mut restored = 0;
        for job in jobs {
            if job.target().is_none()
                || job.interval_seconds <= 0
                || (job.interval_seconds as u64) > MAX_DURATION_SECONDS
            {
                warn!(job_name = %job.job_name, target = %job.target_type, "Dropping malformed timed broadcast");
                self.db.admin.delete_timed_broadcast(&job.job_name).await?;
                continue;
            }
            self.spawn_job(job);
            restored += 1;
        }
        info!(restored, "Timed broadcasts restored");
        Ok(restored)
    }

    fn spawn_job(&self, job: TimedBroadcast) {
        let service = self.clone();
        let job_name = job.job_name.clone();
        let handle = tokio::spawn(async move { service.run_job(job).await });

        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = jobs.insert(job_name, handle.abort_handle()) {
            previous.abort();
        }
    }

    async fn run_job(&self, mut job: TimedBroadcast) {
        let Some(target) = job.target() else {
            return;
        };
        let interval = job.interval_seconds as u64;
        let keyboard = job.keyboard();

        loop {
            let wait = (job.next_run_at - self.clock.now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;

            if let Err(e) = self.broadcast(target, &job.message_text, keyboard.as_ref()).await {
                error!(job_name = %job.job_name, error = %e, "Timed broadcast run failed");
            }

            let Some(next_run_at) = checked_after(self.clock.now(), interval) else {
                error!(job_name = %job.job_name, "Next run is out of range, stopping job");
                return;
            };
            job.next_run_at = next_run_at;
            if let Err(e) = self.db.admin.update_next_run(&job.job_name, job.next_run_at).await {
                error!(job_name = %job.job_name, error = %e, "Could not persist next run");
            }
        }
    }

    /// Stop a job and delete its row. Returns false for unknown jobs.
    pub async fn stop(&self, job_name: &str) -> Result<bool> {
        let handle = self
            .jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_name);
        if let Some(handle) = &handle {
            handle.abort();
        }
        let deleted = self.db.admin.delete_timed_broadcast(job_name).await?;
        Ok(handle.is_some() || deleted)
    }

    /// Names of running jobs, sorted
    pub fn active_jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Abort every running job, keeping their rows for the next start
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
    }
}
