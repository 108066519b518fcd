//! Error taxonomy for tracking and aggregation operations.

use thiserror::Error;

use crate::store::StoreError;
use crate::types::{TaskId, ValidationError};

/// Typed failures raised by the tracking manager and the aggregators.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The task or open entry is absent or owned by someone else.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// A timer is already running for the task.
    #[error("task {task_id} is already being tracked")]
    Conflict { task_id: TaskId },

    /// Malformed input such as an inverted date range.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The underlying store failed.
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
}

impl TrackerError {
    pub fn task_not_found(task_id: &TaskId) -> Self {
        Self::NotFound {
            what: "task",
            id: task_id.to_string(),
        }
    }

    pub fn open_entry_not_found(task_id: &TaskId) -> Self {
        Self::NotFound {
            what: "open time entry for task",
            id: task_id.to_string(),
        }
    }

    /// HTTP-equivalent status for the boundary layer. A duplicate start is a
    /// 400, like any other rejected request.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } | Self::Validation(_) => 400,
            Self::Store(_) => 500,
        }
    }

    /// Message safe to show a caller. Store detail is never included.
    pub fn public_message(&self) -> String {
        match self {
            Self::Store(_) => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyOpen { task_id } => Self::Conflict { task_id },
            StoreError::NotOpen { entry_id } => Self::NotFound {
                what: "open time entry",
                id: entry_id.to_string(),
            },
            backend @ StoreError::Backend(_) => Self::Store(backend),
        }
    }
}
