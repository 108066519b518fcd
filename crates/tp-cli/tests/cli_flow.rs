//! End-to-end tests driving the `tp` binary against a scratch database.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tp(home: &Path, user: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tp"))
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("TP_DATABASE_PATH", home.join("data/tp.db"))
        .env("TP_USER_ID", user)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run tp")
}

fn ok(output: &Output) -> String {
    assert!(
        output.status.success(),
        "tp should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_str(&ok(output)).unwrap()
}

fn add_task(home: &Path, user: &str, title: &str, priority: &str) -> String {
    ok(&tp(
        home,
        user,
        &["task", "add", "--title", title, "--priority", priority],
    ));
    let tasks = json(&tp(home, user, &["task", "list", "--json"]));
    tasks
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["title"] == title)
        .and_then(|t| t["id"].as_str())
        .unwrap()
        .to_string()
}

#[test]
fn start_stop_and_report() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task_id = add_task(home, "alice", "Write docs", "high");

    let started = json(&tp(home, "alice", &["start", &task_id]));
    assert_eq!(started["task_id"], task_id.as_str());
    assert!(started["end_time"].is_null());

    let stopped = json(&tp(home, "alice", &["stop", &task_id]));
    assert_eq!(stopped["id"], started["id"]);
    assert!(stopped["end_time"].is_string());

    let entries = json(&tp(home, "alice", &["entries", &task_id, "--json"]));
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert!(entries[0]["duration_ms"].as_i64().unwrap() >= 0);

    let report = json(&tp(home, "alice", &["report", "--json"]));
    assert_eq!(report["time_entries"].as_array().unwrap().len(), 1);
}

#[test]
fn second_start_is_rejected() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task_id = add_task(home, "alice", "Review", "medium");

    ok(&tp(home, "alice", &["start", &task_id]));
    let output = tp(home, "alice", &["start", &task_id]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already being tracked"), "stderr: {stderr}");
}

#[test]
fn stop_without_running_timer_is_not_found() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task_id = add_task(home, "alice", "Idle", "low");

    let output = tp(home, "alice", &["stop", &task_id]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn tasks_are_scoped_to_the_configured_user() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task_id = add_task(home, "alice", "Private", "high");

    let output = tp(home, "bob", &["start", &task_id]);
    assert!(!output.status.success());

    let tasks = json(&tp(home, "bob", &["task", "list", "--json"]));
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn task_statistics_as_json() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let done = add_task(home, "alice", "Done", "high");
    add_task(home, "alice", "Open", "high");
    ok(&tp(home, "alice", &["task", "status", &done, "completed"]));

    let stats = json(&tp(home, "alice", &["stats", "tasks", "--json"]));
    assert_eq!(stats["total_tasks"], 2);
    assert_eq!(stats["by_status"]["completed"], 1);
    assert_eq!(stats["by_priority"]["high"]["total"], 2);
    assert_eq!(stats["by_priority"]["low"]["total"], 0);
    assert!((stats["completion_rate"].as_f64().unwrap() - 0.5).abs() < f64::EPSILON);

    let productivity = json(&tp(home, "alice", &["stats", "productivity", "--json"]));
    assert_eq!(productivity["total_completed"], 1);
    assert_eq!(productivity["current_streak"], 1);
}

#[test]
fn inverted_range_is_a_validation_error() {
    let temp = TempDir::new().unwrap();
    let output = tp(
        temp.path(),
        "alice",
        &["report", "--start", "2024-03-05", "--end", "2024-03-01"],
    );
    assert!(!output.status.success());
}
