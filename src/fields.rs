use crate::error::{Result, TickError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static REMINDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)([mhd])$").unwrap());

pub const PRIORITY_NONE: i32 = 0;
pub const PRIORITY_LOW: i32 = 1;
pub const PRIORITY_MEDIUM: i32 = 3;
pub const PRIORITY_HIGH: i32 = 5;

/// `none|low|medium|high` to the API's 0/1/3/5 scale. The numerals
/// themselves are accepted too.
pub fn parse_priority(value: &str) -> Result<i32> {
    match value.trim().to_lowercase().as_str() {
        "none" | "0" => Ok(PRIORITY_NONE),
        "low" | "1" => Ok(PRIORITY_LOW),
        "medium" | "3" => Ok(PRIORITY_MEDIUM),
        "high" | "5" => Ok(PRIORITY_HIGH),
        _ => Err(TickError::InvalidPriorityValue(value.to_string())),
    }
}

/// Anything outside 0/1/3/5 renders as `none`.
pub fn format_priority(value: i32) -> &'static str {
    match value {
        PRIORITY_LOW => "low",
        PRIORITY_MEDIUM => "medium",
        PRIORITY_HIGH => "high",
        _ => "none",
    }
}

/// Best-effort reminder conversion: `15m` -> `TRIGGER:-PT15M`,
/// `2h` -> `TRIGGER:-PT2H`, `3d` -> `TRIGGER:-P3D`.
pub fn try_parse_reminder(value: &str) -> Option<String> {
    let caps = REMINDER_RE.captures(value.trim())?;
    let n = &caps[1];
    match &caps[2] {
        "m" => Some(format!("TRIGGER:-PT{}M", n)),
        "h" => Some(format!("TRIGGER:-PT{}H", n)),
        "d" => Some(format!("TRIGGER:-P{}D", n)),
        _ => None,
    }
}

pub fn parse_reminder(value: &str) -> Result<String> {
    try_parse_reminder(value).ok_or_else(|| TickError::InvalidReminderFormat(value.to_string()))
}

/// Parse any due-date shape the API hands back (or a user typed).
pub fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn is_date_only(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
}

/// Date-only input becomes midnight UTC in the API's timestamp format;
/// anything else must already parse and passes through untouched.
pub fn normalize_due_date(value: &str) -> Result<String> {
    let value = value.trim();
    if is_date_only(value) {
        return Ok(format!("{}T00:00:00+0000", value));
    }
    if parse_due_date(value).is_some() {
        return Ok(value.to_string());
    }
    Err(TickError::Validation(format!("invalid due date '{}'", value)))
}

/// Comma separated tag list, blanks dropped.
pub fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
