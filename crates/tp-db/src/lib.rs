//! Storage layer for the task time tracker.
//!
//! Provides persistence for tasks and time entries using `rusqlite`, and
//! implements [`TimeEntryStore`] for the tracking and aggregation logic.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Open one `Database` per thread or process; they may share the same file.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic order matches
//! chronological order and window filters can run in SQL.
//!
//! ## Open Entry Invariant
//!
//! `idx_time_entries_one_open` is a partial unique index on
//! `time_entries(task_id) WHERE end_time IS NULL`. Inserting a second open
//! entry for a task fails inside SQLite, which makes the insert itself the
//! conditional write. This holds across connections and processes.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use thiserror::Error;
use tp_core::{
    EntryId, Priority, StoreError, Task, TaskId, TaskStatus, TimeEntry, TimeEntryStore, UserId,
    ValidationError, Window,
};
use tracing::debug;
use uuid::Uuid;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for row {row_id}: {timestamp}")]
    TimestampParse {
        row_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed domain validation.
    #[error("invalid data in row {row_id}")]
    InvalidRow {
        row_id: String,
        #[source]
        source: ValidationError,
    },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::backend(err)
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Fields supplied when creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial edit of a task; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending',
                priority TEXT NOT NULL DEFAULT 'medium',
                due_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                -- set when status moves to completed, cleared when it leaves
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);

            -- end_time NULL means the timer is running
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_time_entries_task ON time_entries(task_id);
            CREATE INDEX IF NOT EXISTS idx_time_entries_user_start
                ON time_entries(user_id, start_time);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_one_open
                ON time_entries(task_id) WHERE end_time IS NULL;
            ",
        )?;
        Ok(())
    }

    // ========== Tasks ==========

    /// Creates a pending task owned by `user_id`.
    pub fn create_task(&self, user_id: &UserId, new: &NewTask) -> Result<Task, DbError> {
        self.create_task_at(user_id, new, Utc::now())
    }

    pub fn create_task_at(
        &self,
        user_id: &UserId,
        new: &NewTask,
        now: DateTime<Utc>,
    ) -> Result<Task, DbError> {
        let id = Uuid::new_v4().to_string();
        let now_text = format_timestamp(now);
        self.conn.execute(
            "
            INSERT INTO tasks
                (id, user_id, title, description, status, priority, due_date,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?)
            ",
            params![
                id,
                user_id.as_str(),
                new.title,
                new.description,
                new.priority.as_str(),
                new.due_date.map(format_timestamp),
                now_text,
                now_text,
            ],
        )?;
        debug!(task_id = %id, %user_id, "task created");
        self.fetch_task(&id, user_id.as_str())?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Looks up a task by id, restricted to its owner.
    pub fn get_task(&self, task_id: &TaskId, user_id: &UserId) -> Result<Option<Task>, DbError> {
        self.fetch_task(task_id.as_str(), user_id.as_str())
    }

    /// Lists a user's tasks, optionally by creation time, oldest first.
    pub fn tasks_for_user(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<Task>, DbError> {
        let (start, end) = window_bounds(window);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, user_id, title, description, status, priority, due_date,
                   created_at, updated_at, completed_at
            FROM tasks
            WHERE user_id = ?1
              AND (?2 IS NULL OR created_at >= ?2)
              AND (?3 IS NULL OR created_at <= ?3)
            ORDER BY created_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(params![user_id.as_str(), start, end], TaskRow::from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    /// Sets a task's status.
    ///
    /// A real transition stamps `updated_at`; moving into `completed` also
    /// stamps `completed_at` and moving out clears it. Re-applying the current
    /// status leaves both untouched. Returns `None` if the user owns no such task.
    pub fn update_task_status(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        status: TaskStatus,
    ) -> Result<Option<Task>, DbError> {
        self.update_task_status_at(task_id, user_id, status, Utc::now())
    }

    pub fn update_task_status_at(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, DbError> {
        // Right-hand sides see the row as it was before the update.
        let changed = self.conn.execute(
            "
            UPDATE tasks SET
                updated_at = CASE WHEN status = ?1 THEN updated_at ELSE ?2 END,
                completed_at = CASE
                    WHEN ?1 <> 'completed' THEN NULL
                    WHEN status = 'completed' THEN completed_at
                    ELSE ?2
                END,
                status = ?1
            WHERE id = ?3 AND user_id = ?4
            ",
            params![
                status.as_str(),
                format_timestamp(now),
                task_id.as_str(),
                user_id.as_str()
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_task(task_id, user_id)
    }

    /// Applies a partial edit. Returns `None` if the user owns no such task.
    ///
    /// Status and `completed_at` are not touched.
    pub fn update_task(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        update: &TaskUpdate,
    ) -> Result<Option<Task>, DbError> {
        let changed = self.conn.execute(
            "
            UPDATE tasks SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                priority = COALESCE(?, priority),
                due_date = COALESCE(?, due_date),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
            params![
                update.title,
                update.description,
                update.priority.map(|p| p.as_str()),
                update.due_date.map(format_timestamp),
                format_timestamp(Utc::now()),
                task_id.as_str(),
                user_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_task(task_id, user_id)
    }

    /// Deletes a task and, by cascade, its time entries.
    ///
    /// Returns whether a task was removed.
    pub fn delete_task(&self, task_id: &TaskId, user_id: &UserId) -> Result<bool, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM tasks WHERE id = ? AND user_id = ?",
            params![task_id.as_str(), user_id.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn fetch_task(&self, task_id: &str, user_id: &str) -> Result<Option<Task>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, user_id, title, description, status, priority, due_date,
                       created_at, updated_at, completed_at
                FROM tasks
                WHERE id = ? AND user_id = ?
                ",
                params![task_id, user_id],
                TaskRow::from_row,
            )
            .optional()?;
        row.map(TaskRow::into_task).transpose()
    }

    // ========== Time entries ==========

    fn open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<TimeEntry>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, task_id, user_id, start_time, end_time
                FROM time_entries
                WHERE task_id = ? AND user_id = ? AND end_time IS NULL
                ",
                params![task_id.as_str(), user_id.as_str()],
                EntryRow::from_row,
            )
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    fn entry_by_id(&self, entry_id: &str) -> Result<TimeEntry, DbError> {
        self.conn
            .query_row(
                "SELECT id, task_id, user_id, start_time, end_time FROM time_entries WHERE id = ?",
                params![entry_id],
                EntryRow::from_row,
            )?
            .into_entry()
    }

    fn insert_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        start_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        let id = Uuid::new_v4().to_string();
        let inserted = self.conn.execute(
            "
            INSERT INTO time_entries (id, task_id, user_id, start_time, end_time)
            VALUES (?, ?, ?, ?, NULL)
            ",
            params![id, task_id.as_str(), user_id.as_str(), format_timestamp(start_time)],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_open_entry_conflict(&err) => {
                debug!(%task_id, "open entry insert lost to an existing timer");
                return Err(StoreError::AlreadyOpen {
                    task_id: task_id.clone(),
                });
            }
            Err(err) => return Err(DbError::from(err).into()),
        }
        Ok(self.entry_by_id(&id)?)
    }

    fn close_open_entry(
        &self,
        entry_id: &EntryId,
        end_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE time_entries SET end_time = ? WHERE id = ? AND end_time IS NULL",
                params![format_timestamp(end_time), entry_id.as_str()],
            )
            .map_err(DbError::from)?;
        if changed == 0 {
            return Err(StoreError::NotOpen {
                entry_id: entry_id.clone(),
            });
        }
        Ok(self.entry_by_id(entry_id.as_str())?)
    }

    fn query_entries(
        &self,
        task_id: Option<&TaskId>,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, DbError> {
        let (start, end) = window_bounds(window);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, task_id, user_id, start_time, end_time
            FROM time_entries
            WHERE user_id = ?1
              AND (?2 IS NULL OR task_id = ?2)
              AND (?3 IS NULL OR start_time >= ?3)
              AND (?4 IS NULL OR start_time <= ?4)
            ORDER BY start_time DESC, id DESC
            ",
        )?;
        let rows = stmt.query_map(
            params![user_id.as_str(), task_id.map(TaskId::as_str), start, end],
            EntryRow::from_row,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}

impl TimeEntryStore for Database {
    fn find_task_owned_by(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<Task>, StoreError> {
        Ok(self.get_task(task_id, user_id)?)
    }

    fn find_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
    ) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self.open_entry(task_id, user_id)?)
    }

    fn create_open_entry(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        start_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        self.insert_open_entry(task_id, user_id, start_time)
    }

    fn close_entry(
        &self,
        entry_id: &EntryId,
        end_time: DateTime<Utc>,
    ) -> Result<TimeEntry, StoreError> {
        self.close_open_entry(entry_id, end_time)
    }

    fn list_entries(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.query_entries(Some(task_id), user_id, window)?)
    }

    fn list_user_entries(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.query_entries(None, user_id, window)?)
    }

    fn list_tasks(
        &self,
        user_id: &UserId,
        window: Option<&Window>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks_for_user(user_id, window)?)
    }
}

#[derive(Debug)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    due_date: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            priority: row.get(5)?,
            due_date: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            completed_at: row.get(9)?,
        })
    }

    fn into_task(self) -> Result<Task, DbError> {
        let invalid = |source| DbError::InvalidRow {
            row_id: self.id.clone(),
            source,
        };
        Ok(Task {
            id: TaskId::new(self.id.clone()).map_err(invalid)?,
            user_id: UserId::new(self.user_id.clone()).map_err(invalid)?,
            status: self.status.parse().map_err(invalid)?,
            priority: self.priority.parse().map_err(invalid)?,
            due_date: self
                .due_date
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            updated_at: parse_timestamp(&self.updated_at, &self.id)?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id))
                .transpose()?,
            title: self.title,
            description: self.description,
        })
    }
}

#[derive(Debug)]
struct EntryRow {
    id: String,
    task_id: String,
    user_id: String,
    start_time: String,
    end_time: Option<String>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            user_id: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let invalid = |source| DbError::InvalidRow {
            row_id: self.id.clone(),
            source,
        };
        Ok(TimeEntry {
            id: EntryId::new(self.id.clone()).map_err(invalid)?,
            task_id: TaskId::new(self.task_id.clone()).map_err(invalid)?,
            user_id: UserId::new(self.user_id.clone()).map_err(invalid)?,
            start_time: parse_timestamp(&self.start_time, &self.id)?,
            end_time: self
                .end_time
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id))
                .transpose()?,
        })
    }
}

/// Whether an insert failed on the one-open-entry unique index.
fn is_open_entry_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn window_bounds(window: Option<&Window>) -> (Option<String>, Option<String>) {
    window.map_or((None, None), |w| {
        (
            Some(format_timestamp(w.start())),
            Some(format_timestamp(w.end())),
        )
    })
}

fn parse_timestamp(timestamp: &str, row_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            row_id: row_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
