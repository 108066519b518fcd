//! Completion and time-distribution summaries.
//!
//! Both summaries are recomputed from store reads on every call. They are
//! best-effort point-in-time views and are not transactional with respect to
//! concurrent timer writes.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::entry::TimeEntry;
use crate::error::TrackerError;
use crate::store::TimeEntryStore;
use crate::task::Task;
use crate::types::{Priority, TaskStatus, UserId, Window};

/// Task counts per status.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    const fn bump(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }
}

/// Completion figures for one priority bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct PriorityStats {
    pub total: usize,
    pub completed: usize,
    /// Fraction in `[0, 1]`; zero for an empty bucket.
    pub completion_rate: f64,
}

/// Task counts and completion rates for one user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatisticsSnapshot {
    pub total_tasks: usize,
    pub by_status: StatusCounts,
    /// Always holds every priority, empty buckets included.
    pub by_priority: BTreeMap<Priority, PriorityStats>,
    /// Fraction in `[0, 1]`; zero when there are no tasks.
    pub completion_rate: f64,
}

/// Where tracked time went.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimeSnapshot {
    /// Sum of closed entry durations.
    pub total_time_ms: i64,
    pub time_by_priority: BTreeMap<Priority, i64>,
    /// Keyed by weekday name of the entry start (`"Monday"`, ...).
    pub time_by_day: BTreeMap<String, i64>,
    pub average_time_per_task_ms: i64,
    /// Distinct tasks among the counted entries.
    pub tasks_tracked: usize,
}

/// `numerator / denominator`, or zero when the denominator is zero.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Single pass over `tasks` counting by status and priority.
pub fn summarize_tasks(tasks: &[Task]) -> StatisticsSnapshot {
    let mut by_status = StatusCounts::default();
    let mut buckets: BTreeMap<Priority, (usize, usize)> =
        Priority::ALL.into_iter().map(|p| (p, (0, 0))).collect();

    for task in tasks {
        by_status.bump(task.status);
        let (total, completed) = buckets.entry(task.priority).or_default();
        *total += 1;
        if task.is_completed() {
            *completed += 1;
        }
    }

    let by_priority = buckets
        .into_iter()
        .map(|(priority, (total, completed))| {
            (
                priority,
                PriorityStats {
                    total,
                    completed,
                    completion_rate: ratio(completed, total),
                },
            )
        })
        .collect();

    StatisticsSnapshot {
        total_tasks: tasks.len(),
        by_status,
        by_priority,
        completion_rate: ratio(by_status.completed, tasks.len()),
    }
}

/// Distributes closed entry durations by task priority and start weekday.
///
/// Running entries, and entries whose task is not in `tasks`, are skipped.
pub fn summarize_time(entries: &[TimeEntry], tasks: &[Task]) -> TimeSnapshot {
    let priorities: HashMap<_, _> = tasks.iter().map(|t| (&t.id, t.priority)).collect();

    let mut total_time_ms = 0;
    let mut time_by_priority: BTreeMap<Priority, i64> =
        Priority::ALL.into_iter().map(|p| (p, 0)).collect();
    let mut time_by_day: BTreeMap<String, i64> = BTreeMap::new();
    let mut distinct_tasks = HashSet::new();

    for entry in entries {
        let Some(duration) = entry.closed_duration_ms() else {
            continue;
        };
        let Some(&priority) = priorities.get(&entry.task_id) else {
            debug!(entry_id = %entry.id, task_id = %entry.task_id, "entry without task skipped");
            continue;
        };

        total_time_ms += duration;
        *time_by_priority.entry(priority).or_default() += duration;
        *time_by_day
            .entry(weekday_name(entry.start_time.weekday()).to_string())
            .or_default() += duration;
        distinct_tasks.insert(&entry.task_id);
    }

    let tasks_tracked = distinct_tasks.len();
    let average_time_per_task_ms = i64::try_from(tasks_tracked)
        .ok()
        .filter(|&n| n > 0)
        .map_or(0, |n| total_time_ms / n);

    TimeSnapshot {
        total_time_ms,
        time_by_priority,
        time_by_day,
        average_time_per_task_ms,
        tasks_tracked,
    }
}

/// Read-only reports over one user's tasks and entries.
pub struct StatisticsAggregator<S> {
    store: S,
}

impl<S: TimeEntryStore> StatisticsAggregator<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Completion summary over tasks created inside `window`.
    pub fn task_statistics(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<StatisticsSnapshot, TrackerError> {
        let tasks = self.store.list_tasks(user_id, window)?;
        debug!(%user_id, tasks = tasks.len(), "computing task statistics");
        Ok(summarize_tasks(&tasks))
    }

    /// Time distribution over entries started inside `window`.
    pub fn time_statistics(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<TimeSnapshot, TrackerError> {
        let entries = self.store.list_user_entries(user_id, window)?;
        // Priorities come from every task the user owns; the window scopes entries only.
        let tasks = self.store.list_tasks(user_id, None)?;
        debug!(%user_id, entries = entries.len(), "computing time statistics");
        Ok(summarize_time(&entries, &tasks))
    }
}
