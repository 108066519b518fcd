//! Task management commands.
//!
//! Task CRUD is routine; the interesting part is that every mutation is
//! announced through the publisher so live clients stay consistent.

use std::io::Write;

use anyhow::Result;
use tp_core::{EventName, Scope, Task, TaskStatus, TrackerError};
use tp_db::{NewTask, TaskUpdate};

use super::{Context, parse_task_id, storage};

pub fn add<W: Write>(writer: &mut W, ctx: &Context<'_>, new: &NewTask) -> Result<()> {
    let task = ctx.db.create_task(&ctx.user_id, new).map_err(storage)?;
    announce(ctx, EventName::TaskCreated, &task);
    writeln!(writer, "Created task {} ({})", task.id, task.title)?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, ctx: &Context<'_>, json: bool) -> Result<()> {
    let tasks = ctx.db.tasks_for_user(&ctx.user_id, None).map_err(storage)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&tasks)?)?;
        return Ok(());
    }

    if tasks.is_empty() {
        writeln!(writer, "No tasks.")?;
        return Ok(());
    }
    for task in &tasks {
        writeln!(writer, "{}", format_task_line(task))?;
    }
    Ok(())
}

pub fn set_status<W: Write>(
    writer: &mut W,
    ctx: &Context<'_>,
    task_id: &str,
    status: TaskStatus,
) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let task = ctx
        .db
        .update_task_status(&task_id, &ctx.user_id, status)
        .map_err(storage)?
        .ok_or_else(|| TrackerError::task_not_found(&task_id))?;

    announce(ctx, EventName::TaskUpdated, &task);
    announce_statistics(ctx);
    writeln!(writer, "{}", format_task_line(&task))?;
    Ok(())
}

pub fn edit<W: Write>(
    writer: &mut W,
    ctx: &Context<'_>,
    task_id: &str,
    update: &TaskUpdate,
) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let task = ctx
        .db
        .update_task(&task_id, &ctx.user_id, update)
        .map_err(storage)?
        .ok_or_else(|| TrackerError::task_not_found(&task_id))?;

    // Priority edits move time and completion buckets.
    announce(ctx, EventName::TaskUpdated, &task);
    announce_statistics(ctx);
    writeln!(writer, "{}", format_task_line(&task))?;
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, ctx: &Context<'_>, task_id: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let removed = ctx.db.delete_task(&task_id, &ctx.user_id).map_err(storage)?;
    if !removed {
        return Err(TrackerError::task_not_found(&task_id).into());
    }

    ctx.publisher.publish(
        EventName::TaskDeleted,
        &serde_json::json!({ "taskId": task_id }),
        &Scope::Broadcast,
    );
    writeln!(writer, "Deleted task {task_id}")?;
    Ok(())
}

fn announce(ctx: &Context<'_>, event: EventName, task: &Task) {
    match serde_json::to_value(task) {
        Ok(payload) => {
            ctx.publisher
                .publish(event, &payload, &Scope::User(ctx.user_id.clone()));
        }
        Err(e) => tracing::warn!(%event, error = %e, "failed to serialize task payload"),
    }
}

fn announce_statistics(ctx: &Context<'_>) {
    ctx.publisher.publish(
        EventName::StatisticsUpdated,
        &serde_json::json!({ "user_id": ctx.user_id }),
        &Scope::User(ctx.user_id.clone()),
    );
}

fn format_task_line(task: &Task) -> String {
    format!(
        "{}  {:<11}  {:<6}  {}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.title
    )
}
