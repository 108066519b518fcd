//! Core domain logic for task time tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Timers: the per-task start/stop state machine
//! - Statistics: completion rates and time distribution
//! - Productivity: completions per day and streaks
//! - Events: the catalogue and the publishing seam for live clients

pub mod entry;
pub mod error;
pub mod events;
pub mod productivity;
pub mod statistics;
pub mod store;
pub mod task;
#[cfg(test)]
mod testing;
pub mod tracking;
pub mod types;

pub use entry::{EntryView, TimeEntry, duration_ms, ms_to_hours};
pub use error::TrackerError;
pub use events::{EventName, NoopPublisher, Publisher, Scope, UnknownEventName};
pub use productivity::{ProductivityMetrics, ProductivityStreakCalculator, compute_productivity};
pub use statistics::{
    PriorityStats, StatisticsAggregator, StatisticsSnapshot, StatusCounts, TimeSnapshot,
    summarize_tasks, summarize_time,
};
pub use store::{StoreError, TimeEntryStore};
pub use task::Task;
pub use tracking::{TimeReport, TimeTrackingManager};
pub use types::{EntryId, Priority, TaskId, TaskStatus, UserId, ValidationError, Window};
