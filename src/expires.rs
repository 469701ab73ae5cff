//! `Expires:` timestamp parsing.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

// Date separators: '-', '.', '/', '\' or U+2212. Time separators: '-', '.', ':'.
static EXPIRES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let ds = r"(?:\x{2212}|[\x2d-\x2f\x5c])?";
    let ts = r"[\x2d\x2e\x3a]?";
    Regex::new(&format!(
        r"(?i)^([12][0-9]{{3}})(?:{ds}(0[1-9]|1[0-2])(?:{ds}(0[1-9]|[12][0-9]|3[01])(?:\x20?T?([01][0-9]|2[0-3])(?:{ts}([0-5][0-9])(?:{ts}([0-5][0-9]))?)?)?)?)?$",
        ds = ds,
        ts = ts
    ))
    .expect("expires pattern is valid")
});

/// Parse an expiry timestamp, from `YYYY-MM-DDTHH:MM:SS` down to `YYYY`.
///
/// Missing components default to the earliest value. Days past the end of
/// the month roll over into the next month. Returns `None` when the text
/// is not a recognised timestamp.
pub fn parse_expires(text: &str) -> Option<DateTime<Utc>> {
    let caps = EXPIRES_PATTERN.captures(text)?;
    let field = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month = field(2, 1)?;
    let day = field(3, 1)?;
    let hour = field(4, 0)?;
    let minute = field(5, 0)?;
    let second = field(6, 0)?;

    let date = NaiveDate::from_ymd_opt(year, month, 1)? + Duration::days(i64::from(day) - 1);
    let naive = date.and_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Whether an `Expires:` value lies before `now`.
///
/// Unparseable values never expire.
pub fn is_expired(text: &str, now: DateTime<Utc>) -> bool {
    parse_expires(text).is_some_and(|expires| expires < now)
}
