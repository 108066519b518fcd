//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tp_core::{TrackerError, Window};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Which end of a range a bare date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Midnight at the start of the day.
    Start,
    /// The last millisecond of the day.
    End,
}

/// Parse a datetime string as ISO 8601, a bare date, or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Date: "2026-01-15" (start or end of that UTC day, per `bound`)
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, bound: Bound) -> anyhow::Result<DateTime<Utc>> {
    parse_datetime_at(s, bound, Utc::now())
}

pub fn parse_datetime_at(
    s: &str,
    bound: Bound,
    now: DateTime<Utc>,
) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        return Ok(match bound {
            Bound::Start => start,
            Bound::End => start + Duration::days(1) - Duration::milliseconds(1),
        });
    }

    // Try relative time: "N hours/minutes/days/weeks ago"
    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z), a date (2026-01-15) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Builds the query window from optional `--start` / `--end` flags.
///
/// A missing start means the Unix epoch; a missing end means now.
/// An inverted range is a validation failure.
pub fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Window>> {
    if start.is_none() && end.is_none() {
        return Ok(None);
    }
    let start = start
        .map(|s| parse_datetime_at(s, Bound::Start, now))
        .transpose()?
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let end = end
        .map(|s| parse_datetime_at(s, Bound::End, now))
        .transpose()?
        .unwrap_or(now);
    let window = Window::new(start, end).map_err(TrackerError::from)?;
    Ok(Some(window))
}

/// Formats milliseconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
/// Negative durations are treated as 0m.
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats a `[0, 1]` fraction as a percentage with one decimal.
pub fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
