//! In-memory store and recording publisher for unit tests.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Utc};

use crate::entry::TimeEntry;
use crate::events::{EventName, Publisher, Scope};
use crate::store::{StoreError, TimeEntryStore};
use crate::task::Task;
use crate::types::{EntryId, TaskId, UserId, Window};

#[derive(Default)]
pub struct MemoryStore {
    pub tasks: RefCell<Vec<Task>>,
    pub entries: RefCell<Vec<TimeEntry>>,
    next_id: Cell<u32>,
    pub fail: Cell<bool>,
}

impl MemoryStore {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::default();
        *store.tasks.borrow_mut() = tasks;
        store
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.get() {
            return Err(StoreError::backend(std::io::Error::other(
                "connection reset",
            )));
        }
        Ok(())
    }
}

fn newest_first(mut entries: Vec<TimeEntry>) -> Vec<TimeEntry> {
    entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    entries
}

impl TimeEntryStore for MemoryStore {
    fn find_task_owned_by(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<Task>, StoreError> {
        self.check()?;
        Ok(self
            .tasks
            .borrow()
            .iter()
            .find(|t| &t.id == task_id && &t.user_id == user_id)
            .cloned())
    }

    fn find_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<TimeEntry>, StoreError> {
        self.check()?;
        Ok(self
            .entries
            .borrow()
            .iter()
            .find(|e| &e.task_id == task_id && &e.user_id == user_id && e.is_open())
            .cloned())
    }

    fn create_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        start_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        self.check()?;
        let mut entries = self.entries.borrow_mut();
        if entries.iter().any(|e| &e.task_id == task_id && e.is_open()) {
            return Err(StoreError::AlreadyOpen {
                task_id: task_id.clone(),
            });
        }
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let entry = TimeEntry {
            id: EntryId::new(format!("entry-{n}")).unwrap(),
            task_id: task_id.clone(),
            user_id: user_id.clone(),
            start_time,
            end_time: None,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    fn close_entry(
        &self,
        entry_id: &EntryId,
        end_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        self.check()?;
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .iter_mut()
            .find(|e| &e.id == entry_id && e.is_open())
            .ok_or_else(|| StoreError::NotOpen {
                entry_id: entry_id.clone(),
            })?;
        entry.end_time = Some(end_time);
        Ok(entry.clone())
    }

    fn list_entries(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        self.check()?;
        let entries = self
            .entries
            .borrow()
            .iter()
            .filter(|e| &e.task_id == task_id && &e.user_id == user_id)
            .filter(|e| window.is_none_or(|w| w.contains(e.start_time)))
            .cloned()
            .collect();
        Ok(newest_first(entries))
    }

    fn list_user_entries(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        self.check()?;
        let entries = self
            .entries
            .borrow()
            .iter()
            .filter(|e| &e.user_id == user_id)
            .filter(|e| window.is_none_or(|w| w.contains(e.start_time)))
            .cloned()
            .collect();
        Ok(newest_first(entries))
    }

    fn list_tasks(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<Task>, StoreError> {
        self.check()?;
        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|t| &t.user_id == user_id)
            .filter(|t| window.is_none_or(|w| w.contains(t.created_at)))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: RefCell<Vec<(EventName, serde_json::Value, Scope)>>,
}

impl RecordingPublisher {
    pub fn names(&self) -> Vec<EventName> {
        self.events.borrow().iter().map(|(name, _, _)| *name).collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, event: EventName, payload: &serde_json::Value, scope: &Scope) {
        self.events
            .borrow_mut()
            .push((event, payload.clone(), scope.clone()));
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn task_id(id: &str) -> TaskId {
    TaskId::new(id).unwrap()
}
