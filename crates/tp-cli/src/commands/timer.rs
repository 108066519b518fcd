//! Timer commands: `tp start`, `tp stop`, `tp entries`.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use tp_core::{EntryView, TimeEntry, TimeTrackingManager};

use super::util::format_duration;
use super::{Context, parse_task_id};

pub fn start<W: Write>(writer: &mut W, ctx: &Context<'_>, task_id: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let entry = manager(ctx).start(&task_id, &ctx.user_id)?;
    write_entry(writer, &entry)
}

pub fn stop<W: Write>(writer: &mut W, ctx: &Context<'_>, task_id: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let entry = manager(ctx).stop(&task_id, &ctx.user_id)?;
    write_entry(writer, &entry)
}

pub fn entries<W: Write>(
    writer: &mut W,
    ctx: &Context<'_>,
    task_id: &str,
    json: bool,
) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let views = manager(ctx).list_entries(&task_id, &ctx.user_id)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&views)?)?;
    } else {
        write!(writer, "{}", format_entries(&views))?;
    }
    Ok(())
}

fn manager<'a>(
    ctx: &Context<'a>,
) -> TimeTrackingManager<&'a tp_db::Database, &'a dyn tp_core::Publisher> {
    TimeTrackingManager::new(ctx.db, ctx.publisher)
}

fn write_entry<W: Write>(writer: &mut W, entry: &TimeEntry) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(entry)?)?;
    Ok(())
}

/// One line per entry, newest first.
pub fn format_entries(views: &[EntryView]) -> String {
    let mut output = String::new();
    if views.is_empty() {
        writeln!(output, "No time entries.").unwrap();
        return output;
    }
    for view in views {
        writeln!(output, "{}", format_entry_line(view)).unwrap();
    }
    output
}

pub(crate) fn format_entry_line(view: &EntryView) -> String {
    let entry = &view.entry;
    let end = entry.end_time.map_or_else(
        || "running".to_string(),
        |end| end.format("%Y-%m-%d %H:%M").to_string(),
    );
    format!(
        "{}  {} -> {:<16}  {:>7}  {}",
        entry.id,
        entry.start_time.format("%Y-%m-%d %H:%M"),
        end,
        format_duration(view.duration_ms),
        entry.task_id,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use tp_core::{EntryId, NoopPublisher, TaskId, TrackerError, UserId};
    use tp_db::{Database, NewTask};

    use super::*;

    fn view(id: &str, minutes: i64, closed: bool) -> EntryView {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();
        let end = start + Duration::minutes(minutes);
        let entry = TimeEntry {
            id: EntryId::new(id).unwrap(),
            task_id: TaskId::new("t1").unwrap(),
            user_id: UserId::new("alice").unwrap(),
            start_time: start,
            end_time: closed.then_some(end),
        };
        EntryView::at(entry, end)
    }

    #[test]
    fn formats_closed_and_running_entries() {
        let output = format_entries(&[view("e2", 30, false), view("e1", 90, true)]);
        insta::assert_snapshot!(output, @r"
        e2  2024-01-03 09:00 -> running               30m  t1
        e1  2024-01-03 09:00 -> 2024-01-03 10:30   1h 30m  t1
        ");
    }

    #[test]
    fn formats_empty_list() {
        assert_eq!(format_entries(&[]), "No time entries.\n");
    }

    #[test]
    fn start_and_stop_print_the_entry() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::new("alice").unwrap();
        let task = db
            .create_task(
                &user,
                &NewTask {
                    title: "Ship".to_string(),
                    ..NewTask::default()
                },
            )
            .unwrap();
        let ctx = Context {
            db: &db,
            user_id: user,
            publisher: &NoopPublisher,
        };

        let mut out = Vec::new();
        start(&mut out, &ctx, task.id.as_str()).unwrap();
        let started: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(started["task_id"], task.id.as_str());
        assert!(started["end_time"].is_null());

        let err = start(&mut Vec::new(), &ctx, task.id.as_str()).unwrap_err();
        let tracker = err.downcast_ref::<TrackerError>().unwrap();
        assert!(matches!(tracker, TrackerError::Conflict { .. }));

        let mut out = Vec::new();
        stop(&mut out, &ctx, task.id.as_str()).unwrap();
        let stopped: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(stopped["id"], started["id"]);
        assert!(stopped["end_time"].is_string());
    }
}
