//! Test helpers module
//!
//! Shared setup for the integration tests: the fake Bot API, the test
//! context and builders for Telegram updates.

#![allow(dead_code)]

pub mod fake_bot;
pub mod test_context;
pub mod updates;

pub use fake_bot::*;
pub use test_context::*;
pub use updates::*;
