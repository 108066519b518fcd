//! Start/stop timer state machine.
//!
//! Each (task, user) pair is either idle (no open entry) or running (exactly
//! one open entry). The transition into running is the store's conditional
//! insert, so two concurrent starts cannot both win, even across processes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entry::{EntryView, TimeEntry, ms_to_hours};
use crate::error::TrackerError;
use crate::events::{EventName, Publisher, Scope};
use crate::store::{StoreError, TimeEntryStore};
use crate::types::{TaskId, UserId, Window};

/// Entries in a window with their combined duration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimeReport {
    pub time_entries: Vec<EntryView>,
    pub total_time_ms: i64,
    pub total_time_hours: f64,
}

/// Enforces per-task timer exclusivity and announces transitions.
pub struct TimeTrackingManager<S, P> {
    store: S,
    publisher: P,
}

impl<S: TimeEntryStore, P: Publisher> TimeTrackingManager<S, P> {
    pub const fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Starts a timer on `task_id` for `user_id`.
    pub fn start(&self, task_id: &TaskId, user_id: &UserId) -> Result<TimeEntry, TrackerError> {
        self.start_at(task_id, user_id, Utc::now())
    }

    pub fn start_at(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, TrackerError> {
        if self.store.find_task_owned_by(task_id, user_id)?.is_none() {
            debug!(%task_id, %user_id, "start rejected: task not owned");
            return Err(TrackerError::task_not_found(task_id));
        }

        let entry = self
            .store
            .create_open_entry(task_id, user_id, now)
            .map_err(|err| {
                if matches!(err, StoreError::AlreadyOpen { .. }) {
                    debug!(%task_id, "start rejected: timer already running");
                }
                TrackerError::from(err)
            })?;

        info!(%task_id, %user_id, entry_id = %entry.id, "timer started");
        self.announce(EventName::TimeStarted, &entry, user_id);
        Ok(entry)
    }

    /// Stops the running timer on `task_id` for `user_id`.
    pub fn stop(&self, task_id: &TaskId, user_id: &UserId) -> Result<TimeEntry, TrackerError> {
        self.stop_at(task_id, user_id, Utc::now())
    }

    pub fn stop_at(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, TrackerError> {
        let Some(open) = self.store.find_open_entry(task_id, user_id)? else {
            return Err(TrackerError::open_entry_not_found(task_id));
        };

        // A concurrent stop may close the entry between the read and the write.
        let entry = match self.store.close_entry(&open.id, now) {
            Ok(entry) => entry,
            Err(StoreError::NotOpen { .. }) => {
                return Err(TrackerError::open_entry_not_found(task_id));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            %task_id,
            %user_id,
            entry_id = %entry.id,
            duration_ms = entry.closed_duration_ms().unwrap_or_default(),
            "timer stopped"
        );
        self.announce(EventName::TimeStopped, &entry, user_id);
        self.publisher.publish(
            EventName::StatisticsUpdated,
            &serde_json::json!({ "user_id": user_id }),
            &Scope::User(user_id.clone()),
        );
        Ok(entry)
    }

    /// Entries for one task, newest first, with derived durations.
    pub fn list_entries(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Vec<EntryView>, TrackerError> {
        self.list_entries_at(task_id, user_id, Utc::now())
    }

    pub fn list_entries_at(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntryView>, TrackerError> {
        let entries = self.store.list_entries(task_id, user_id, None)?;
        Ok(entries
            .into_iter()
            .map(|entry| EntryView::at(entry, now))
            .collect())
    }

    /// All of a user's entries in the window and their total duration.
    ///
    /// Running entries contribute their elapsed time.
    pub fn report(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<TimeReport, TrackerError> {
        self.report_at(user_id, window, Utc::now())
    }

    pub fn report_at(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
        now: DateTime<Utc>,
    ) -> Result<TimeReport, TrackerError> {
        let time_entries: Vec<EntryView> = self
            .store
            .list_user_entries(user_id, window)?
            .into_iter()
            .map(|entry| EntryView::at(entry, now))
            .collect();
        let total_time_ms = time_entries.iter().map(|view| view.duration_ms).sum();

        Ok(TimeReport {
            time_entries,
            total_time_ms,
            total_time_hours: ms_to_hours(total_time_ms),
        })
    }

    fn announce(&self, event: EventName, entry: &TimeEntry, user_id: &UserId) {
        match serde_json::to_value(entry) {
            Ok(payload) => {
                self.publisher
                    .publish(event, &payload, &Scope::User(user_id.clone()));
            }
            Err(e) => warn!(%event, error = %e, "failed to serialize event payload"),
        }
    }
}
