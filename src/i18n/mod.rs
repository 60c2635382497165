//! Internationalization module
//!
//! Message catalogue for bot replies in English and Hindi.

pub mod loader;

pub use loader::{params, I18n, TranslationParams, DEFAULT_LANGUAGE};
