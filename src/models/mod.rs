//! Data models module
//!
//! This module contains all data structures persisted by the bot and the
//! value types shared by the moderation pipeline.

pub mod broadcast;
pub mod callback;
pub mod group;
pub mod moderation;
pub mod settings;
pub mod user;

// Re-export commonly used models
pub use broadcast::{BroadcastTarget, Button, ButtonKind, Keyboard, TimedBroadcast};
pub use callback::CallbackAction;
pub use group::{Group, GroupMember, UpdateGroupPunishment};
pub use moderation::{ActionLogEntry, BadActor, IssueType, ProfileField, PunishAction, TriggerType};
pub use settings::{FeatureControl, UnmuteAttempt};
pub use user::{UpsertUserRequest, User};
