//! Day-level completion metrics and streak detection.
//!
//! # Algorithm
//!
//! 1. Bucket completion timestamps by UTC calendar date.
//! 2. Walk the distinct dates in ascending order. The running streak grows by
//!    one when a date directly follows the previous one and resets to one
//!    otherwise. The largest running value is the longest streak.
//! 3. The final running value is the current streak only while the last
//!    completion date is today or yesterday.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::TrackerError;
use crate::statistics::ratio;
use crate::store::TimeEntryStore;
use crate::types::{UserId, Window};

/// Completion activity for one user over a window.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProductivityMetrics {
    pub total_completed: usize,
    /// Completions per calendar date, ascending.
    pub tasks_per_day: BTreeMap<NaiveDate, usize>,
    /// Completions per day that had at least one; zero when there were none.
    pub average_tasks_per_day: f64,
    /// Consecutive days ending today or yesterday.
    pub current_streak: u32,
    pub longest_streak: u32,
}

/// Computes metrics from completion timestamps, with `today` as the reference day.
pub fn compute_productivity<I>(completions: I, today: NaiveDate) -> ProductivityMetrics
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut tasks_per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for completed_at in completions {
        *tasks_per_day.entry(completed_at.date_naive()).or_default() += 1;
    }

    let total_completed = tasks_per_day.values().sum();
    let mut running = 0;
    let mut longest_streak = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in tasks_per_day.keys() {
        running = match previous {
            Some(prev) if (date - prev).num_days() == 1 => running + 1,
            _ => 1,
        };
        longest_streak = longest_streak.max(running);
        previous = Some(date);
    }

    let current_streak = match previous {
        Some(last) if (today - last).num_days() <= 1 => running,
        _ => 0,
    };

    ProductivityMetrics {
        total_completed,
        average_tasks_per_day: ratio(total_completed, tasks_per_day.len()),
        tasks_per_day,
        current_streak,
        longest_streak,
    }
}

/// Reads completed tasks from the store and derives [`ProductivityMetrics`].
pub struct ProductivityStreakCalculator<S> {
    store: S,
}

impl<S: TimeEntryStore> ProductivityStreakCalculator<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub fn productivity(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<ProductivityMetrics, TrackerError> {
        self.productivity_at(user_id, window, Utc::now().date_naive())
    }

    /// Tasks count toward the window by completion time, not creation time.
    pub fn productivity_at(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
        today: NaiveDate,
    ) -> Result<ProductivityMetrics, TrackerError> {
        let completions: Vec<DateTime<Utc>> = self
            .store
            .list_tasks(user_id, None)?
            .iter()
            .filter_map(crate::task::Task::completion_time)
            .filter(|at| window.is_none_or(|w| w.contains(*at)))
            .collect();
        debug!(%user_id, completed = completions.len(), "computing productivity");
        Ok(compute_productivity(completions, today))
    }
}
