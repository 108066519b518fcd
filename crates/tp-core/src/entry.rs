//! Time entries and the single place durations are derived.
//!
//! Durations are never stored. Every consumer (the tracking manager, the
//! time report and the time distribution) goes through [`duration_ms`] or
//! [`TimeEntry::closed_duration_ms`] so rounding and clamping stay uniform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EntryId, TaskId, UserId};

/// One contiguous stretch of tracked time against a task.
///
/// `end_time = None` means the timer is still running. For a given task at
/// most one entry may be open at a time; the store enforces this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeEntry {
    pub id: EntryId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// `end_time - start_time` for a closed entry, `None` while running.
    pub fn closed_duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| duration_ms(self.start_time, Some(end), end))
    }

    /// Duration if closed, otherwise elapsed time as of `now`.
    pub fn duration_ms_at(&self, now: DateTime<Utc>) -> i64 {
        duration_ms(self.start_time, self.end_time, now)
    }
}

/// Milliseconds between `start` and `end`, or `now` when `end` is unset.
///
/// Negative spans (clock skew between writers) clamp to zero.
pub fn duration_ms(start: DateTime<Utc>, end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let end = end.unwrap_or(now);
    (end - start).num_milliseconds().max(0)
}

/// Converts milliseconds to fractional hours.
#[allow(clippy::cast_precision_loss)]
pub fn ms_to_hours(ms: i64) -> f64 {
    ms as f64 / 3_600_000.0
}

/// A time entry as exposed to reports, with its derived duration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: TimeEntry,

    /// Closed duration, or elapsed-so-far for a running entry.
    pub duration_ms: i64,
}

impl EntryView {
    pub fn at(entry: TimeEntry, now: DateTime<Utc>) -> Self {
        let duration_ms = entry.duration_ms_at(now);
        Self { entry, duration_ms }
    }
}
