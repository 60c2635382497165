//! Middleware module
//!
//! Authorization gates and the TTL caches they and the services share.

pub mod auth;
pub mod cache;

pub use auth::{AuthMiddleware, Gate, Role};
pub use cache::{DebounceKey, Debouncer, TtlCache};
