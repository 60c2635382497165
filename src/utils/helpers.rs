//! Helper functions and utilities
//!
//! Duration parsing/formatting, HTML escaping for Telegram messages and
//! parsing of user references given to admin commands.

use chrono::{DateTime, Duration, Utc};

const SECONDS_PER_UNIT: &[(char, u64)] = &[
    ('w', 7 * 24 * 3600),
    ('d', 24 * 3600),
    ('h', 3600),
    ('m', 60),
    ('s', 1),
];

/// Longest accepted duration, roughly one hundred years
pub const MAX_DURATION_SECONDS: u64 = 100 * 365 * 24 * 3600;

/// Parse a human duration such as `30m`, `1h`, `2d`, `1h30m` into seconds.
///
/// `0` (or `permanent`) means a permanent punishment and yields `Some(0)`.
/// A bare number is taken as seconds. Anything else, including values above
/// [`MAX_DURATION_SECONDS`], yields `None`.
pub fn parse_duration(input: &str) -> Option<u64> {
    parse_duration_unbounded(input).filter(|seconds| *seconds <= MAX_DURATION_SECONDS)
}

fn parse_duration_unbounded(input: &str) -> Option<u64> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    if text == "permanent" || text == "perm" {
        return Some(0);
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok();
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let multiplier = SECONDS_PER_UNIT
            .iter()
            .find(|(unit, _)| *unit == c)
            .map(|(_, secs)| *secs)?;
        if digits.is_empty() {
            return None;
        }
        let value: u64 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(multiplier)?)?;
        digits.clear();
    }

    // Trailing digits without a unit ("1h30") are ambiguous
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}

/// Format a duration in seconds, dropping zero units: `3661` -> `1h 1m 1s`.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "permanent".to_string();
    }

    let mut remaining = seconds;
    let mut parts = Vec::new();
    for (unit, secs) in SECONDS_PER_UNIT.iter().skip(1) {
        let amount = remaining / secs;
        if amount > 0 {
            parts.push(format!("{}{}", amount, unit));
            remaining %= secs;
        }
    }
    parts.join(" ")
}

/// `now + seconds`, or `None` when the result is not representable
pub fn checked_after(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let delta = Duration::try_seconds(i64::try_from(seconds).ok()?)?;
    now.checked_add_signed(delta)
}

/// End of a punishment starting now; `None` for permanent ones.
/// Durations past the representable range are treated as permanent.
pub fn punishment_end(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        None
    } else {
        checked_after(now, seconds)
    }
}

/// Escape text for Telegram HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// HTML link mentioning a user by id
pub fn mention_html(user_id: i64, name: &str) -> String {
    format!("<a href=\"tg://user?id={}\">{}</a>", user_id, escape_html(name))
}

/// A user as referenced in an admin command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReference {
    Id(i64),
    Username(String),
}

/// Parse `123456`, `tg://user?id=123456` or `@username`
pub fn parse_user_reference(text: &str) -> Option<UserReference> {
    let text = text.trim();
    if let Some(username) = text.strip_prefix('@') {
        if username.is_empty() {
            return None;
        }
        return Some(UserReference::Username(username.to_lowercase()));
    }
    text.strip_prefix("tg://user?id=")
        .unwrap_or(text)
        .parse::<i64>()
        .ok()
        .map(UserReference::Id)
}
