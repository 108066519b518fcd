//! Tasks: the units of work time is tracked against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Priority, TaskId, TaskStatus, UserId};

/// A discrete piece of work owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,

    /// The owning user.
    pub user_id: UserId,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: TaskStatus,

    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// When the status last moved to completed. Edits leave it alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a pending task stamped at `now`.
    pub fn new(id: TaskId, user_id: UserId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::default(),
            due_date: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the status as of `updated_at`.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        let at = self.updated_at;
        self.transition(status, at);
        self
    }

    /// Moves to `status` at `now`.
    ///
    /// Re-applying the current status changes nothing, so the completion
    /// stamp survives repeated completes.
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.updated_at = now;
        self.completed_at = (status == TaskStatus::Completed).then_some(now);
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// The moment the task became completed, if it is.
    pub fn completion_time(&self) -> Option<DateTime<Utc>> {
        self.completed_at.filter(|_| self.is_completed())
    }
}
