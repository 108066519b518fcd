//! Report command: every entry in a window and the total tracked time.
//!
//! Running timers are included with their elapsed time so the total matches
//! what a live dashboard would show.

use std::fmt::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tp_core::{TimeReport, TimeTrackingManager, Window};

use super::Context;
use super::timer::format_entry_line;
use super::util::format_duration;

/// Formats a report for terminal output.
pub fn format_report(report: &TimeReport, window: Option<&Window>) -> String {
    let mut output = String::new();

    writeln!(output, "TIME REPORT: {}", format_window(window)).unwrap();
    writeln!(output).unwrap();

    if report.time_entries.is_empty() {
        writeln!(output, "No time entries recorded.").unwrap();
    } else {
        for view in &report.time_entries {
            writeln!(output, "  {}", format_entry_line(view)).unwrap();
        }
    }

    writeln!(output).unwrap();
    writeln!(
        output,
        "Total tracked:  {} ({:.2} h)",
        format_duration(report.total_time_ms),
        report.total_time_hours
    )
    .unwrap();

    output
}

fn format_window(window: Option<&Window>) -> String {
    window.map_or_else(
        || "all time".to_string(),
        |w| format!("{} to {}", short(w.start()), short(w.end())),
    )
}

fn short(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Runs the report command.
pub fn run(ctx: &Context<'_>, window: Option<&Window>, json: bool) -> Result<()> {
    let manager = TimeTrackingManager::new(ctx.db, ctx.publisher);
    let report = manager.report(&ctx.user_id, window)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report, window));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use insta::assert_snapshot;
    use tp_core::{EntryId, EntryView, TaskId, TimeEntry, UserId, ms_to_hours};

    use super::*;

    fn entry(id: &str, task: &str, start_hour: u32, minutes: Option<i64>) -> TimeEntry {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, start_hour, 0, 0).unwrap();
        TimeEntry {
            id: EntryId::new(id).unwrap(),
            task_id: TaskId::new(task).unwrap(),
            user_id: UserId::new("alice").unwrap(),
            start_time: start,
            end_time: minutes.map(|m| start + Duration::minutes(m)),
        }
    }

    fn report(entries: Vec<TimeEntry>, now: DateTime<Utc>) -> TimeReport {
        let time_entries: Vec<EntryView> =
            entries.into_iter().map(|e| EntryView::at(e, now)).collect();
        let total_time_ms = time_entries.iter().map(|v| v.duration_ms).sum();
        TimeReport {
            time_entries,
            total_time_ms,
            total_time_hours: ms_to_hours(total_time_ms),
        }
    }

    #[test]
    fn report_with_running_entry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 14, 15, 0).unwrap();
        let data = report(
            vec![
                entry("e2", "write", 14, None),
                entry("e1", "review", 9, Some(90)),
            ],
            now,
        );
        let window = Window::new(
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            now,
        )
        .unwrap();

        assert_snapshot!(format_report(&data, Some(&window)), @r"
        TIME REPORT: 2024-01-03 00:00 to 2024-01-03 14:15

          e2  2024-01-03 14:00 -> running               15m  write
          e1  2024-01-03 09:00 -> 2024-01-03 10:30   1h 30m  review

        Total tracked:  1h 45m (1.75 h)
        ");
    }

    #[test]
    fn empty_report() {
        let data = report(Vec::new(), Utc::now());
        assert_snapshot!(format_report(&data, None), @r"
        TIME REPORT: all time

        No time entries recorded.

        Total tracked:  0m (0.00 h)
        ");
    }
}
