//! Temporal normalization (§4.8).
//!
//! Three pure, deterministic functions form the axis every analytic turns
//! on: `extract_date`, `extract_datetime_minute`, and `sort_datetime`. They
//! are registered as SQLite scalar functions (see [`super::functions`]) so
//! they are usable inside `WHERE`/`ORDER BY`, and are exposed here as plain
//! Rust functions so the rest of the crate (analytics, process tree,
//! lateral movement) can call them directly without a database round trip.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::sync::OnceLock;

fn month_names() -> &'static [(&'static str, u32)] {
    &[
        ("jan", 1), ("feb", 2), ("mar", 3), ("apr", 4), ("may", 5), ("jun", 6),
        ("jul", 7), ("aug", 8), ("sep", 9), ("oct", 10), ("nov", 11), ("dec", 12),
    ]
}

fn month_from_name(s: &str) -> Option<u32> {
    let lower = s.to_ascii_lowercase();
    month_names()
        .iter()
        .find(|(name, _)| lower.starts_with(name))
        .map(|(_, n)| *n)
}

fn us_date_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(
            r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2}))?\s*(AM|PM|am|pm)?)?",
        )
        .unwrap()
    })
}

fn month_first_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})").unwrap()
    })
}

fn month_last_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]{3,9})\.?,?\s+(\d{4})").unwrap()
    })
}

fn digits_only(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Excel's epoch is 1899-12-30 (serial 0), accounting for the historical
/// leap-year bug baked into the 1900 date system.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !(1.0..=73050.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.trunc() as i64;
    let frac = serial.fract();
    let date = epoch.checked_add_signed(chrono::Duration::days(days))?;
    let seconds_in_day = (frac * 86_400.0).round() as i64;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        seconds_in_day.clamp(0, 86_399) as u32,
        0,
    )?;
    Some(NaiveDateTime::new(date, time))
}

fn parse_hms(h: &str, m: &str, s: Option<&str>, ampm: Option<&str>) -> Option<NaiveTime> {
    let mut hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    let second: u32 = s.and_then(|s| s.parse().ok()).unwrap_or(0);
    if let Some(suffix) = ampm {
        let is_pm = suffix.eq_ignore_ascii_case("pm");
        hour %= 12;
        if is_pm {
            hour += 12;
        }
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Best-effort parse of an arbitrary DFIR cell value into a `NaiveDateTime`.
/// Tries, in order: ISO-prefixed strings, Unix seconds, Unix milliseconds,
/// Excel serial dates, US `M/D/YYYY`, European name-first/name-last month
/// formats, and finally a permissive RFC3339/common-format fallback.
pub fn parse_any_datetime(raw: &str) -> Option<NaiveDateTime> {
    let v = raw.trim();
    if v.is_empty() {
        return None;
    }

    // ISO-prefixed: YYYY-MM-DD[...]
    if v.len() >= 10 && v.as_bytes()[4] == b'-' && v.as_bytes()[7] == b'-' && digits_only(&v[0..4])
    {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(v) {
            return Some(dt.naive_utc());
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&v.replace('T', " "), "%Y-%m-%d %H:%M:%S%.f")
        {
            return Some(ndt);
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&v.replace('T', " "), "%Y-%m-%d %H:%M:%S") {
            return Some(ndt);
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&v.replace('T', " "), "%Y-%m-%d %H:%M") {
            return Some(ndt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(&v[0..10], "%Y-%m-%d") {
            return Some(d.and_hms_opt(0, 0, 0).unwrap());
        }
    }

    // Unix seconds / milliseconds (pure digit strings)
    if digits_only(v) {
        if v.len() == 10 {
            if let Ok(secs) = v.parse::<i64>() {
                if let Some(dt) = chrono::DateTime::from_timestamp(secs, 0) {
                    return Some(dt.naive_utc());
                }
            }
        } else if v.len() == 13 {
            if let Ok(millis) = v.parse::<i64>() {
                if let Some(dt) = chrono::DateTime::from_timestamp_millis(millis) {
                    return Some(dt.naive_utc());
                }
            }
        }
    }

    // Excel serial date: bare number (integer or decimal) in [1, 73050]
    if let Ok(serial) = v.parse::<f64>() {
        if let Some(ndt) = excel_serial_to_datetime(serial) {
            return Some(ndt);
        }
    }

    // US M/D/YYYY or M-D-YYYY, optional time with AM/PM
    if let Some(caps) = us_date_re().captures(v) {
        let month: u32 = caps.get(1)?.as_str().parse().ok()?;
        let day: u32 = caps.get(2)?.as_str().parse().ok()?;
        let year: i32 = caps.get(3)?.as_str().parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = match (caps.get(4), caps.get(5)) {
            (Some(h), Some(m)) => parse_hms(
                h.as_str(),
                m.as_str(),
                caps.get(6).map(|m| m.as_str()),
                caps.get(7).map(|m| m.as_str()),
            )
            .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            _ => NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        };
        return Some(NaiveDateTime::new(date, time));
    }

    // European name-first: "Feb 5th 2026"
    if let Some(caps) = month_first_re().captures(v) {
        let month = month_from_name(caps.get(1)?.as_str())?;
        let day: u32 = caps.get(2)?.as_str().parse().ok()?;
        let year: i32 = caps.get(3)?.as_str().parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some(date.and_hms_opt(0, 0, 0).unwrap());
    }

    // European name-last: "5 Feb 2026"
    if let Some(caps) = month_last_re().captures(v) {
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month = month_from_name(caps.get(2)?.as_str())?;
        let year: i32 = caps.get(3)?.as_str().parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some(date.and_hms_opt(0, 0, 0).unwrap());
    }

    // Final permissive fallback: a handful of common layouts.
    const FORMATS: &[&str] = &[
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y",
        "%m/%d/%Y",
    ];
    for fmt in FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(ndt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
            return Some(d.and_hms_opt(0, 0, 0).unwrap());
        }
    }

    None
}

/// `extract_date(v)` → `YYYY-MM-DD` or `None` for unparseable values.
pub fn extract_date(raw: &str) -> Option<String> {
    parse_any_datetime(raw).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// `extract_datetime_minute(v)` → `YYYY-MM-DD HH:MM` truncated to the
/// minute, or `None`.
pub fn extract_datetime_minute(raw: &str) -> Option<String> {
    parse_any_datetime(raw).map(|dt| {
        let truncated = dt.with_second(0).and_then(|d| d.with_nanosecond(0)).unwrap_or(dt);
        truncated.format("%Y-%m-%d %H:%M").to_string()
    })
}

/// `sort_datetime(v)` → a lexicographically sortable approximation of ISO
/// order. Values that fail every heuristic sort after all parseable values
/// by falling back to the raw (trimmed) string, so a mixed column still
/// produces a total, if imperfect, order.
pub fn sort_datetime(raw: &str) -> String {
    match parse_any_datetime(raw) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        None => format!("9999-99-99 {}", raw.trim()),
    }
}

/// True if `year` falls within the plausible DFIR evidence range; used by
/// callers that want to sanity-check a parse before trusting it for display.
pub fn plausible_year(dt: &NaiveDateTime) -> bool {
    let y = dt.year();
    (1990..=2100).contains(&y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_prefixed() {
        assert_eq!(extract_date("2024-01-01 00:00:01"), Some("2024-01-01".into()));
        assert_eq!(
            extract_datetime_minute("2024-01-01T00:00:01Z"),
            Some("2024-01-01 00:00".into())
        );
    }

    #[test]
    fn iso_date_not_misparsed_as_numeric() {
        // Regression for the year-as-number trap called out in §3.
        assert_eq!(extract_date("2026-01-17"), Some("2026-01-17".into()));
    }

    #[test]
    fn us_date_with_ampm() {
        assert_eq!(
            extract_datetime_minute("1/5/2025 2:30 PM"),
            Some("2025-01-05 14:30".into())
        );
    }

    #[test]
    fn month_first_and_last() {
        assert_eq!(extract_date("Feb 5th 2026"), Some("2026-02-05".into()));
        assert_eq!(extract_date("5 Feb 2026"), Some("2026-02-05".into()));
    }

    #[test]
    fn unix_seconds_and_millis() {
        assert_eq!(extract_date("1704067200"), Some("2024-01-01".into()));
        assert_eq!(extract_date("1704067200000"), Some("2024-01-01".into()));
    }

    #[test]
    fn excel_serial() {
        // 45292 == 2024-01-01 in the 1900 date system.
        assert_eq!(extract_date("45292"), Some("2024-01-01".into()));
    }

    #[test]
    fn unparseable_is_none() {
        assert_eq!(extract_date("not a date"), None);
    }

    #[test]
    fn sort_order_defeats_lexicographic_mixing() {
        let mut values = vec!["2025-01-01", "2024-12-31"];
        values.sort_by_key(|v| sort_datetime(v));
        assert_eq!(values, vec!["2024-12-31", "2025-01-01"]);
    }
}
