//! Translation loader and message lookup
//!
//! Translations ship embedded in the binary and may be overridden by JSON
//! files in a directory at startup. Keys are dotted paths into the JSON
//! tree (`"unmute.rate_limited"`); `{name}` placeholders are substituted
//! from the supplied parameters.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::utils::errors::{Result, SentinelError};

const EMBEDDED: &[(&str, &str)] = &[
    ("en", include_str!("../../translations/en.json")),
    ("hi", include_str!("../../translations/hi.json")),
];

/// Default language of every reply
pub const DEFAULT_LANGUAGE: &str = "en";

/// Message catalogue
#[derive(Debug, Clone)]
pub struct I18n {
    /// Loaded translations by language code
    translations: HashMap<String, Map<String, Value>>,
    default_language: String,
    supported_languages: Vec<String>,
}

/// Translation parameters for message formatting
pub type TranslationParams = HashMap<String, String>;

/// Build parameters from `(name, value)` pairs
pub fn params<I, K, V>(pairs: I) -> TranslationParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

impl I18n {
    /// Catalogue built from the translations compiled into the binary
    pub fn embedded() -> Result<Self> {
        let mut i18n = Self {
            translations: HashMap::new(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            supported_languages: EMBEDDED.iter().map(|(code, _)| code.to_string()).collect(),
        };
        for (code, content) in EMBEDDED {
            i18n.insert_language(code, content)?;
        }
        Ok(i18n)
    }

    /// Replace embedded languages with the files found in `dir`.
    /// Missing files keep the embedded copy.
    pub async fn load_overrides(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            debug!("Translations directory {} not found, using embedded catalogue", dir.display());
            return Ok(());
        }

        for lang_code in self.supported_languages.clone() {
            let file_path = dir.join(format!("{}.json", lang_code));
            if !file_path.exists() {
                continue;
            }
            let content = fs::read_to_string(&file_path).await?;
            self.insert_language(&lang_code, &content)?;
            info!("Loaded translation overrides for {} from {}", lang_code, file_path.display());
        }

        Ok(())
    }

    fn insert_language(&mut self, lang_code: &str, content: &str) -> Result<()> {
        match serde_json::from_str::<Value>(content)? {
            Value::Object(map) => {
                debug!("Loaded {} translation sections for {}", map.len(), lang_code);
                self.translations.insert(lang_code.to_string(), map);
                Ok(())
            }
            _ => Err(SentinelError::Config(format!(
                "Invalid translation file format for {}",
                lang_code
            ))),
        }
    }

    /// Translated message, falling back to the default language and then
    /// to the key itself
    pub fn t(&self, key: &str, lang: &str, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.get_effective_language(lang);

        let text = self
            .get_translation_text(key, effective_lang)
            .or_else(|| self.get_translation_text(key, &self.default_language));

        match text {
            Some(text) => self.format_message(&text, params),
            None => {
                warn!("Translation key '{}' not found", key);
                key.to_string()
            }
        }
    }

    /// Default-language message without parameters
    pub fn text(&self, key: &str) -> String {
        self.t(key, &self.default_language, None)
    }

    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }

    fn get_effective_language<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.is_language_supported(lang) && self.translations.contains_key(lang) {
            lang
        } else {
            &self.default_language
        }
    }

    fn get_translation_text(&self, key: &str, lang: &str) -> Option<String> {
        let mut current = self.translations.get(lang)?.get(key.split('.').next()?)?;
        for k in key.split('.').skip(1) {
            current = current.get(k)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn format_message(&self, template: &str, params: Option<&TranslationParams>) -> String {
        match params {
            Some(params) => params.iter().fold(template.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{}}}", key), value)
            }),
            None => template.to_string(),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Language of a Telegram user, from their client locale
    pub fn detect_user_language(&self, telegram_lang: Option<&str>) -> String {
        if let Some(lang) = telegram_lang {
            let lang_code = lang.split('-').next().unwrap_or(lang);
            if self.is_language_supported(lang_code) {
                return lang_code.to_string();
            }
        }
        self.default_language.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalogue_loads() {
        let i18n = I18n::embedded().unwrap();
        assert_eq!(i18n.default_language(), "en");
        assert!(i18n.t("gates.maintenance", "en", None).contains("maintenance"));
    }

    #[test]
    fn test_language_detection() {
        let i18n = I18n::embedded().unwrap();
        assert_eq!(i18n.detect_user_language(Some("en-US")), "en");
        assert_eq!(i18n.detect_user_language(Some("hi")), "hi");
        assert_eq!(i18n.detect_user_language(Some("fr")), "en");
        assert_eq!(i18n.detect_user_language(None), "en");
    }

    #[test]
    fn test_fallback_to_default_language() {
        let i18n = I18n::embedded().unwrap();
        let english = i18n.t("admin.setchannel_cleared", "en", None);
        assert_eq!(i18n.t("admin.setchannel_cleared", "hi", None), english);
        assert_ne!(i18n.t("unmute.not_yours", "hi", None), i18n.t("unmute.not_yours", "en", None));
    }

    #[test]
    fn test_unknown_key_returns_key() {
        let i18n = I18n::embedded().unwrap();
        assert_eq!(i18n.t("no.such.key", "en", None), "no.such.key");
        // a section is not a message
        assert_eq!(i18n.t("gates", "en", None), "gates");
    }

    #[test]
    fn test_message_formatting() {
        let i18n = I18n::embedded().unwrap();
        let p = params([("wait_duration", "5 minutes")]);
        assert_eq!(
            i18n.t("unmute.rate_limited", "en", Some(&p)),
            "⏳ Rate limited. Please wait 5 minutes before trying again."
        );
        let p = params([("command_name", "checkbio")]);
        assert!(i18n.t("gates.feature_disabled", "en", Some(&p)).contains("/checkbio"));
    }
}
