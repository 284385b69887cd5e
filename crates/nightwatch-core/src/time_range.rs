//! Natural-language time-range resolution.
//!
//! Understands a small fixed vocabulary of relative phrases plus an explicit
//! `from <A> to <B>` form. Anything else resolves to `None` and callers fall
//! back to their own default window.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

use crate::types::TimeRange;

/// Relative phrases matched case-insensitively as substrings, in priority order.
const RELATIVE_PHRASES: &[(&str, i64)] = &[
    ("last 24 hours", 1),
    ("yesterday", 1),
    ("last 7 days", 7),
    ("last 30 days", 30),
];

static EXPLICIT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)from\s+(.+?)\s+to\s+(.+)").expect("explicit range regex is valid")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y", "%B %d %Y", "%d %b %Y", "%b %d, %Y"];

/// Resolve a phrase against the current wall-clock time.
pub fn resolve(phrase: Option<&str>) -> Option<TimeRange> {
    resolve_at(phrase, Utc::now())
}

/// Resolve a phrase relative to `now`.
///
/// Relative phrases win over the explicit form. An explicit range with an
/// unparseable bound yields `None`, never a half-open range.
pub fn resolve_at(phrase: Option<&str>, now: DateTime<Utc>) -> Option<TimeRange> {
    let phrase = phrase.map(str::trim).filter(|p| !p.is_empty())?;
    let lowered = phrase.to_lowercase();

    for (needle, days) in RELATIVE_PHRASES {
        if lowered.contains(needle) {
            return Some(TimeRange::lookback_days(*days, now));
        }
    }

    let captures = EXPLICIT_RANGE.captures(phrase)?;
    let start = parse_datetime(&captures[1]);
    let end = parse_datetime(&captures[2]);
    match (start, end) {
        (Some(start), Some(end)) => TimeRange::new(start, end),
        _ => {
            debug!(phrase, "Could not parse explicit time range bounds");
            None
        }
    }
}

/// Resolve a phrase, falling back to `[now - lookback_days, now)`.
pub fn resolve_or_default(phrase: Option<&str>, lookback_days: i64, now: DateTime<Utc>) -> TimeRange {
    resolve_at(phrase, now).unwrap_or_else(|| TimeRange::lookback_days(lookback_days, now))
}

/// Parse a single date or date-time. Values without an offset are UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Human-readable window length used in prompts, e.g. `"7 days"`.
pub fn describe(range: &TimeRange) -> String {
    let duration: Duration = range.duration();
    if duration.num_hours() < 24 {
        format!("{} hours", duration.num_hours())
    } else {
        format!("{} days", duration.num_days())
    }
}
