//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod admin;
pub mod group;
pub mod moderation;
pub mod user;

// Re-export repositories
pub use admin::AdminRepository;
pub use group::GroupRepository;
pub use moderation::{ModerationRepository, NewActionLog};
pub use user::UserRepository;
