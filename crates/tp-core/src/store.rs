//! The persistence seam consumed by the tracking and aggregation logic.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::TimeEntry;
use crate::task::Task;
use crate::types::{EntryId, TaskId, UserId, Window};

/// Failures surfaced by a [`TimeEntryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional insert found an open entry for the task already.
    #[error("task {task_id} already has an open time entry")]
    AlreadyOpen { task_id: TaskId },

    /// The entry was closed by someone else before this write landed.
    #[error("time entry {entry_id} is not open")]
    NotOpen { entry_id: EntryId },

    /// Anything else the backend reports. Never shown to callers verbatim.
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Durable record of tasks and time entries, filtered by owner.
///
/// The "at most one open entry per task" invariant lives here:
/// [`create_open_entry`](Self::create_open_entry) must be a single conditional
/// write that fails with [`StoreError::AlreadyOpen`] when it loses, because
/// the store may be shared by several processes.
pub trait TimeEntryStore {
    fn find_task_owned_by(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<Task>, StoreError>;

    fn find_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<TimeEntry>, StoreError>;

    fn create_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        start_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError>;

    /// Sets `end_time` on an open entry. Fails with [`StoreError::NotOpen`] if
    /// the entry is already closed.
    fn close_entry(
        &self,
        entry_id: &EntryId,
        end_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError>;

    /// Entries of one task, newest `start_time` first.
    fn list_entries(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError>;

    /// Entries across all of a user's tasks whose `start_time` is in the
    /// window, newest first.
    fn list_user_entries(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError>;

    /// Tasks owned by the user, optionally filtered by creation time.
    fn list_tasks(&self, user_id: &UserId, window: Option<&Window>)
    -> Result<Vec<Task>, StoreError>;
}

impl<S: TimeEntryStore + ?Sized> TimeEntryStore for &S {
    fn find_task_owned_by(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<Task>, StoreError> {
        (**self).find_task_owned_by(task_id, user_id)
    }

    fn find_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<TimeEntry>, StoreError> {
        (**self).find_open_entry(task_id, user_id)
    }

    fn create_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        start_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        (**self).create_open_entry(task_id, user_id, start_time)
    }

    fn close_entry(
        &self,
        entry_id: &EntryId,
        end_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        (**self).close_entry(entry_id, end_time)
    }

    fn list_entries(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).list_entries(task_id, user_id, window)
    }

    fn list_user_entries(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).list_user_entries(user_id, window)
    }

    fn list_tasks(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<Task>, StoreError> {
        (**self).list_tasks(user_id, window)
    }
}
