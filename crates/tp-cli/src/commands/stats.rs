//! Statistics commands: task completion, time distribution, productivity.

use std::fmt::Write;

use anyhow::Result;
use chrono::Weekday;
use serde::Serialize;
use tp_core::statistics::weekday_name;
use tp_core::{
    ProductivityMetrics, ProductivityStreakCalculator, StatisticsAggregator, StatisticsSnapshot,
    TimeSnapshot, Window,
};

use super::Context;
use super::util::{format_duration, format_percent};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn format_task_statistics(stats: &StatisticsSnapshot) -> String {
    let mut output = String::new();

    writeln!(output, "TASK STATISTICS").unwrap();
    writeln!(output, "───────────────").unwrap();
    writeln!(output, "Total tasks:      {}", stats.total_tasks).unwrap();
    writeln!(output, "  Pending:        {}", stats.by_status.pending).unwrap();
    writeln!(output, "  In progress:    {}", stats.by_status.in_progress).unwrap();
    writeln!(output, "  Completed:      {}", stats.by_status.completed).unwrap();
    writeln!(
        output,
        "Completion rate:  {}",
        format_percent(stats.completion_rate)
    )
    .unwrap();

    writeln!(output).unwrap();
    writeln!(output, "BY PRIORITY").unwrap();
    writeln!(output, "───────────").unwrap();
    for (priority, bucket) in &stats.by_priority {
        let done = format!("{}/{}", bucket.completed, bucket.total);
        writeln!(
            output,
            "  {:<8}{:>7}  {:>6}",
            priority.as_str(),
            done,
            format_percent(bucket.completion_rate)
        )
        .unwrap();
    }

    output
}

pub fn format_time_statistics(stats: &TimeSnapshot) -> String {
    let mut output = String::new();

    writeln!(output, "TIME STATISTICS").unwrap();
    writeln!(output, "───────────────").unwrap();
    writeln!(
        output,
        "Total tracked:    {}",
        format_duration(stats.total_time_ms)
    )
    .unwrap();
    writeln!(output, "Tasks tracked:    {}", stats.tasks_tracked).unwrap();
    writeln!(
        output,
        "Average per task: {}",
        format_duration(stats.average_time_per_task_ms)
    )
    .unwrap();

    writeln!(output).unwrap();
    writeln!(output, "BY PRIORITY").unwrap();
    writeln!(output, "───────────").unwrap();
    for (priority, ms) in &stats.time_by_priority {
        writeln!(output, "  {:<8}{:>7}", priority.as_str(), format_duration(*ms)).unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "BY DAY").unwrap();
    writeln!(output, "──────").unwrap();
    if stats.time_by_day.is_empty() {
        writeln!(output, "  (no closed entries)").unwrap();
    }
    for name in WEEK.into_iter().map(weekday_name) {
        if let Some(ms) = stats.time_by_day.get(name) {
            writeln!(output, "  {name:<10}{:>7}", format_duration(*ms)).unwrap();
        }
    }

    output
}

pub fn format_productivity(metrics: &ProductivityMetrics) -> String {
    let mut output = String::new();

    writeln!(output, "PRODUCTIVITY").unwrap();
    writeln!(output, "────────────").unwrap();
    writeln!(output, "Completed:        {}", metrics.total_completed).unwrap();
    writeln!(
        output,
        "Average per day:  {:.1}",
        metrics.average_tasks_per_day
    )
    .unwrap();
    writeln!(output, "Current streak:   {}", days(metrics.current_streak)).unwrap();
    writeln!(output, "Longest streak:   {}", days(metrics.longest_streak)).unwrap();

    if !metrics.tasks_per_day.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "BY DAY").unwrap();
        writeln!(output, "──────").unwrap();
        for (date, count) in &metrics.tasks_per_day {
            writeln!(output, "  {date}  {count}").unwrap();
        }
    }

    output
}

fn days(n: u32) -> String {
    if n == 1 {
        "1 day".to_string()
    } else {
        format!("{n} days")
    }
}

fn emit<T: Serialize>(value: &T, json: bool, format: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", format(value));
    }
    Ok(())
}

pub fn tasks(ctx: &Context<'_>, window: Option<&Window>, json: bool) -> Result<()> {
    let stats = StatisticsAggregator::new(ctx.db).task_statistics(&ctx.user_id, window)?;
    emit(&stats, json, format_task_statistics)
}

pub fn time(ctx: &Context<'_>, window: Option<&Window>, json: bool) -> Result<()> {
    let stats = StatisticsAggregator::new(ctx.db).time_statistics(&ctx.user_id, window)?;
    emit(&stats, json, format_time_statistics)
}

pub fn productivity(ctx: &Context<'_>, window: Option<&Window>, json: bool) -> Result<()> {
    let metrics = ProductivityStreakCalculator::new(ctx.db).productivity(&ctx.user_id, window)?;
    emit(&metrics, json, format_productivity)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use insta::assert_snapshot;
    use tp_core::{
        Priority, Task, TaskId, TaskStatus, UserId, compute_productivity, summarize_tasks,
        summarize_time,
    };

    use super::*;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap()
    }

    fn task(id: &str, priority: Priority, status: TaskStatus) -> Task {
        Task::new(
            TaskId::new(id).unwrap(),
            UserId::new("alice").unwrap(),
            id,
            at(1),
        )
        .with_priority(priority)
        .with_status(status)
    }

    #[test]
    fn task_statistics_output() {
        let stats = summarize_tasks(&[
            task("a", Priority::High, TaskStatus::Completed),
            task("b", Priority::High, TaskStatus::InProgress),
            task("c", Priority::Medium, TaskStatus::Completed),
            task("d", Priority::Medium, TaskStatus::Pending),
        ]);
        assert_snapshot!(format_task_statistics(&stats), @r"
        TASK STATISTICS
        ───────────────
        Total tasks:      4
          Pending:        1
          In progress:    1
          Completed:      2
        Completion rate:  50.0%

        BY PRIORITY
        ───────────
          low         0/0    0.0%
          medium      1/2   50.0%
          high        1/2   50.0%
        ");
    }

    #[test]
    fn time_statistics_lists_days_in_week_order() {
        let stats = TimeSnapshot {
            total_time_ms: 5_400_000,
            time_by_priority: Priority::ALL
                .into_iter()
                .zip([0, 1_800_000, 3_600_000])
                .collect(),
            time_by_day: BTreeMap::from([
                ("Wednesday".to_string(), 1_800_000),
                ("Monday".to_string(), 3_600_000),
            ]),
            average_time_per_task_ms: 2_700_000,
            tasks_tracked: 2,
        };
        assert_snapshot!(format_time_statistics(&stats), @r"
        TIME STATISTICS
        ───────────────
        Total tracked:    1h 30m
        Tasks tracked:    2
        Average per task: 45m

        BY PRIORITY
        ───────────
          low          0m
          medium      30m
          high      1h 0m

        BY DAY
        ──────
          Monday      1h 0m
          Wednesday     30m
        ");
    }

    #[test]
    fn time_statistics_without_closed_entries() {
        let stats = summarize_time(&[], &[]);
        let output = format_time_statistics(&stats);
        assert!(output.ends_with("BY DAY\n──────\n  (no closed entries)\n"));
    }

    #[test]
    fn productivity_output() {
        let metrics = compute_productivity(
            [at(1), at(2), at(2)],
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        );
        assert_snapshot!(format_productivity(&metrics), @r"
        PRODUCTIVITY
        ────────────
        Completed:        3
        Average per day:  1.5
        Current streak:   2 days
        Longest streak:   2 days

        BY DAY
        ──────
          2024-01-01  1
          2024-01-02  2
        ");
    }

    #[test]
    fn singular_day() {
        assert_eq!(days(1), "1 day");
        assert_eq!(days(0), "0 days");
    }
}
