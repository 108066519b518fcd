//! CLI subcommand implementations.

pub mod report;
pub mod stats;
pub mod task;
pub mod timer;
pub mod util;

use tp_core::{Publisher, StoreError, TaskId, TrackerError, UserId};
use tp_db::{Database, DbError};

/// Everything a command needs to act on behalf of the configured user.
pub struct Context<'a> {
    pub db: &'a Database,
    pub user_id: UserId,
    pub publisher: &'a dyn Publisher,
}

/// Wraps a storage failure so only a generic message reaches the user.
pub(crate) fn storage(err: DbError) -> TrackerError {
    TrackerError::from(StoreError::from(err))
}

pub(crate) fn parse_task_id(raw: &str) -> Result<TaskId, TrackerError> {
    Ok(TaskId::new(raw)?)
}
