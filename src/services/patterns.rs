//! Forbidden content matcher
//!
//! Text is checked in three stages: whitelist phrases short-circuit to
//! "clean", then the combined forbidden link regex, then the forbidden
//! keyword list. Whitelist and keywords also run against a copy of the
//! text with look-alike characters folded to ASCII. All matching is
//! case-insensitive and the first hit wins.

use regex::{Regex, RegexBuilder};

use crate::models::moderation::IssueType;

/// Default minimum length of a Telegram username in a link
pub const DEFAULT_MIN_USERNAME_LENGTH: usize = 5;

const URL_TAIL: &str = r#"(?:[/?#][^\s<>"']*)?"#;
const HOST: &str = r"(?:[a-zA-Z0-9](?:[a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}";
const TELEGRAM_HOSTS: &str = r"(?:t\.me|telegram\.me|telegram\.dog)";
const EVASION_TLDS: &str = "(?:com|net|org|info|biz|ru|de|uk|co|io|gg|me|xyz|club|site|online|shop|store|app|dev|live|stream|icu|top|buzz|guru)";
const DOMAIN_TLDS: &str =
    "(?:com|net|org|info|biz|ru|de|uk|co|io|me|xyz|app|dev|club|site|online|shop|store|live)";

const FORBIDDEN_WORDS: &[&str] = &[
    // bio
    r"\bb[i1!𝒊𝕚]o\b",
    r"\bb\W*i\W*o\b",
    r"\bbio(?:\s+or\s+link)\b",
    r"\bbio(?:[^\w]|$)",
    // profile
    r"\bpr[o0]+f[i1!𝒊𝕚]+l[e3]+\b",
    r"\bpr\W*o+\W*f\W*i\W*l\W*e+\b",
    // link
    r"\blinks?\b",
    r"\bl\W*i\W*n\W*k\b",
    r"\bl\W*y\W*n\W*k\b",
    "🔗",
    // sell, sale, salesman, seller
    r"\bs[e3]l{2,}\b",
    r"\bs\W*e\W*l\W*l+\b",
    r"\bs[4a@][l1!𝒍𝕝][e3]\b",
    r"\bs[4a@][l1!𝒍𝕝][e3]s[m𝖒][4a@][n𝖓]\b",
    r"\bs[4a@][l1!𝒍𝕝][l1!𝒍𝕝][e3]r\b",
    r"\bcoll\W*ection\b",
    // calls to action
    r"\bin\W*bio\b",
    r"\bin\W*profile\b",
    // sensitive content
    r"\bcp\b",
    r"\bc[/\\]?p\b",
    r"\bc\W?p\b",
    r"\bch[i1!]ld\b",
    r"\bc\W*h\W*i\W*l\W*d\b",
    r"\bcollection\b",
    r"\bcol\W*lection\b",
    // transliterations
    r"\bbyo\b",
    r"\bb\W*a\W*y\W*o\b",
    r"\bchannel\b",
    r"\bchanel\b",
    r"\bchan\W*l\b",
    r"\bc\W*h\W*a\W*n\W*e\W*l\b",
    // Devanagari
    "बायो",
    r"ब\W*ा\W*इ\W*य\W*ो",
    "ग्रुप",
    r"ग\W*र\W*ू\W*प",
    "लिंक",
    r"ल\W*ि\W*क",
    "प्रोफाइल",
    r"प\W*र\W*ो\W*फ\W*ा\W*ई\W*ल",
    "चैनल",
    r"च\W*ै\W*न\W*ल",
    r"ग\W*ु\W*र\W*ू\W*प",
    r"से\W*ल\b",
    r"से\W*ल\W*्\W*स\W*म\W*ै\W*न\b",
    r"व\W*ि\W*क\W*्\W*र\W*े\W*त\W*ा\b",
    r"क\W*ले\W*क\W*्\W*श\W*न\b",
    // Persian
    r"\bبدون\W*سانسور\b",
    r"\bفیلم\W*بدون\W*سانسور\b",
    r"\bسریال\W*بدون\W*سانسور\b",
];

const WHITELIST: &[&str] = &[
    r"^no\s+bio\b.*",
    r"\bbio(?:tech|logy|graphy|metric|nic)\b",
    r"\bprofile\s*(?:pic|picture|photo|link|url)\b",
    r"\bpm\s+me\b",
    r"\bdm\s+me\b",
    r"\bn[o0]\W*b[i1!𝒊𝕚]o\b",
    r"\bb[i1!𝒊𝕚]o\W*dekh\W*kar\W*kya\W*karoge\b",
    r"बायो\W*देख\W*कर\W*क्या\W*करोगे\b",
];

/// Every forbidden link pattern, parameterised by the minimum username
/// length of `t.me` style links
fn forbidden_link_patterns(min_username_length: usize) -> Vec<String> {
    let username = format!("[a-zA-Z0-9_]{{{},32}}", min_username_length);
    let bounded_tail = r#"[^\s<>"']*"#;

    vec![
        // plain URLs
        format!(r"https?://{HOST}{URL_TAIL}"),
        format!(r"ftp://{HOST}{URL_TAIL}"),
        format!(r"\bwww\d{{0,3}}\.{HOST}{URL_TAIL}\b"),
        // Telegram links
        format!(r"\b{TELEGRAM_HOSTS}/{username}(?:[/?]{bounded_tail})?\b"),
        format!(r"\b{TELEGRAM_HOSTS}/(?:joinchat/[a-zA-Z0-9_/\-]+|\+[a-zA-Z0-9_/\-]+)\b"),
        format!(r"\b{TELEGRAM_HOSTS}/{username}\?(?:start|startgroup|admin)={bounded_tail}\b"),
        format!(r"\btg://resolve\?domain={username}(?:&(?:start|startgroup|admin)={bounded_tail})?\b"),
        format!(r"\b{TELEGRAM_HOSTS}/contact\?text={bounded_tail}\b"),
        format!(r"\b{TELEGRAM_HOSTS}/contact/[a-zA-Z0-9_/\-]+\b"),
        format!(r"\b{TELEGRAM_HOSTS}/c/\d+/\d+\b"),
        // "site dot com" evasions
        format!(
            r"\b[a-zA-Z0-9\-]+(?:\s*\[?\(?\s*(?:dot|d0t|\.)\s*\)?\]?|\s+(?:dot|d0t)\s+)[a-zA-Z0-9\-]+\.{EVASION_TLDS}\b"
        ),
        // bare domains
        format!(r"\b[a-zA-Z0-9-]{{1,63}}\.{DOMAIN_TLDS}(?:/{bounded_tail})?\b"),
        // "t.me / name" with whitespace
        format!(r"\b{TELEGRAM_HOSTS}\s*[/:]\s*{username}(?:[/?]{bounded_tail})?\b"),
    ]
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(32 * (1 << 20))
        .build()
}

/// Compiled whitelist, link and keyword patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    whitelist: Vec<Regex>,
    forbidden_links: Regex,
    keywords: Vec<Regex>,
    min_username_length: usize,
}

impl PatternSet {
    pub fn new(min_username_length: usize) -> Result<Self, regex::Error> {
        let whitelist = WHITELIST
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        let combined = forbidden_link_patterns(min_username_length)
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");
        let forbidden_links = compile(&combined)?;

        let keywords = FORBIDDEN_WORDS
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            min_username_length,
            keywords = keywords.len(),
            whitelist = whitelist.len(),
            "Pattern set compiled"
        );

        Ok(Self {
            whitelist,
            forbidden_links,
            keywords,
            min_username_length,
        })
    }

    pub fn min_username_length(&self) -> usize {
        self.min_username_length
    }

    pub fn is_whitelisted(&self, text: &str) -> bool {
        let folded = fold_confusables(text);
        self.whitelist
            .iter()
            .any(|re| re.is_match(text) || re.is_match(&folded))
    }

    pub fn has_forbidden_link(&self, text: &str) -> bool {
        self.forbidden_links.is_match(text)
    }

    pub fn has_forbidden_word(&self, text: &str) -> bool {
        let folded = fold_confusables(text);
        self.keywords
            .iter()
            .any(|re| re.is_match(text) || re.is_match(&folded))
    }

    /// Classify a piece of text; `None` means clean
    pub fn check(&self, text: &str) -> Option<IssueType> {
        let text = text.trim();
        if text.is_empty() || self.is_whitelisted(text) {
            return None;
        }
        if self.has_forbidden_link(text) {
            return Some(IssueType::ForbiddenLink);
        }
        if self.has_forbidden_word(text) {
            return Some(IssueType::ForbiddenWord);
        }
        None
    }
}

/// Replace common look-alike characters with their ASCII counterpart and
/// drop zero-width characters
pub fn fold_confusables(text: &str) -> String {
    text.chars().filter_map(fold_char).collect()
}

fn fold_char(c: char) -> Option<char> {
    let code = c as u32;
    let folded = match code {
        // zero-width space, joiners, BOM
        0x200B..=0x200D | 0x2060 | 0xFEFF => return None,
        // fullwidth ASCII
        0xFF01..=0xFF5E => char::from_u32(code - 0xFEE0).unwrap_or(c),
        // mathematical alphanumeric letters, 13 styles of A-Z a-z
        0x1D400..=0x1D6A3 => {
            let offset = ((code - 0x1D400) % 52) as u8;
            if offset < 26 {
                (b'A' + offset) as char
            } else {
                (b'a' + offset - 26) as char
            }
        }
        // mathematical digits, 5 styles of 0-9
        0x1D7CE..=0x1D7FF => (b'0' + ((code - 0x1D7CE) % 10) as u8) as char,
        _ => fold_lookalike(c),
    };
    Some(folded)
}

fn fold_lookalike(c: char) -> char {
    match c {
        // Cyrillic
        'а' => 'a',
        'в' => 'b',
        'е' | 'ё' => 'e',
        'і' | 'ї' => 'i',
        'ј' => 'j',
        'к' => 'k',
        'м' => 'm',
        'н' => 'h',
        'о' => 'o',
        'р' => 'p',
        'с' => 'c',
        'ѕ' => 's',
        'т' => 't',
        'у' => 'y',
        'х' => 'x',
        'ԁ' => 'd',
        'ӏ' => 'l',
        'А' => 'A',
        'В' => 'B',
        'Е' => 'E',
        'І' => 'I',
        'Ј' => 'J',
        'К' => 'K',
        'М' => 'M',
        'Н' => 'H',
        'О' => 'O',
        'Р' => 'P',
        'С' => 'C',
        'Ѕ' => 'S',
        'Т' => 'T',
        'У' => 'Y',
        'Х' => 'X',
        // Greek
        'α' => 'a',
        'β' => 'b',
        'ε' => 'e',
        'ι' => 'i',
        'κ' => 'k',
        'ν' => 'v',
        'ο' => 'o',
        'ρ' => 'p',
        'τ' => 't',
        'υ' => 'u',
        'χ' => 'x',
        'Α' => 'A',
        'Β' => 'B',
        'Ε' => 'E',
        'Ζ' => 'Z',
        'Η' => 'H',
        'Ι' => 'I',
        'Κ' => 'K',
        'Μ' => 'M',
        'Ν' => 'N',
        'Ο' => 'O',
        'Ρ' => 'P',
        'Τ' => 'T',
        'Υ' => 'Y',
        'Χ' => 'X',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> PatternSet {
        PatternSet::new(DEFAULT_MIN_USERNAME_LENGTH).unwrap()
    }

    #[test]
    fn test_telegram_links_are_flagged() {
        let p = patterns();
        assert_eq!(p.check("join my group t.me/coolgroup123"), Some(IssueType::ForbiddenLink));
        assert_eq!(p.check("https://t.me/+AbCdEf123"), Some(IssueType::ForbiddenLink));
        assert_eq!(p.check("tg://resolve?domain=somechannel"), Some(IssueType::ForbiddenLink));
        assert_eq!(p.check("t.me / spammer_here"), Some(IssueType::ForbiddenLink));
    }

    #[test]
    fn test_urls_and_domains_are_flagged() {
        let p = patterns();
        assert_eq!(p.check("visit https://example.org/page"), Some(IssueType::ForbiddenLink));
        assert_eq!(p.check("best deals at shop-now.store"), Some(IssueType::ForbiddenLink));
        assert_eq!(p.check("go to mysite dot example.com"), Some(IssueType::ForbiddenLink));
        assert_eq!(p.check("WWW.EXAMPLE.NET"), Some(IssueType::ForbiddenLink));
    }

    #[test]
    fn test_keywords_are_flagged() {
        let p = patterns();
        assert_eq!(p.check("check my bio"), Some(IssueType::ForbiddenWord));
        assert_eq!(p.check("sell here"), Some(IssueType::ForbiddenWord));
        assert_eq!(p.check("big s4le today"), Some(IssueType::ForbiddenWord));
        assert_eq!(p.check("join my channel"), Some(IssueType::ForbiddenWord));
        assert_eq!(p.check("मेरा बायो देखो"), Some(IssueType::ForbiddenWord));
        assert_eq!(p.check("🔗 below"), Some(IssueType::ForbiddenWord));
    }

    #[test]
    fn test_confusables_are_folded() {
        let p = patterns();
        // Cyrillic o and Greek iota
        assert_eq!(p.check("see my pr\u{043E}f\u{03B9}le"), Some(IssueType::ForbiddenWord));
        // mathematical bold
        assert_eq!(fold_confusables("𝐛𝐢𝐨"), "bio");
        assert_eq!(fold_confusables("ｌｉｎｋ"), "link");
        assert_eq!(fold_confusables("b\u{200B}io"), "bio");
    }

    #[test]
    fn test_whitelist_short_circuits() {
        let p = patterns();
        assert_eq!(p.check("no bio here, t.me/coolgroup123"), None);
        assert_eq!(p.check("studying biology"), None);
        assert_eq!(p.check("nice profile pic"), None);
        assert_eq!(p.check("dm me for details"), None);
    }

    #[test]
    fn test_clean_text() {
        let p = patterns();
        assert_eq!(p.check("good morning everyone"), None);
        assert_eq!(p.check(""), None);
        // a bare t.me still reads as a domain
        assert_eq!(p.check("t.me/abc"), Some(IssueType::ForbiddenLink));
    }

    #[test]
    fn test_min_username_length_is_configurable() {
        let strict = PatternSet::new(10).unwrap();
        assert!(!strict.forbidden_links.is_match("tg://resolve?domain=short"));
        assert!(patterns().forbidden_links.is_match("tg://resolve?domain=short"));
    }
}
