use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Parser;
use tp_core::{TrackerError, UserId};
use tp_db::{Database, NewTask, TaskUpdate};
use tp_live::Broadcaster;
use tracing_subscriber::EnvFilter;

use tp_cli::commands::util::{Bound, parse_datetime, parse_window};
use tp_cli::commands::{Context, report, stats, task, timer};
use tp_cli::{Cli, Commands, Config, RangeArgs, StatsKind, TaskAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn window(range: &RangeArgs) -> Result<Option<tp_core::Window>> {
    parse_window(
        range.start_date.as_deref(),
        range.end_date.as_deref(),
        Utc::now(),
    )
}

fn due_date(raw: Option<&str>) -> Result<Option<chrono::DateTime<Utc>>> {
    raw.map(|d| parse_datetime(d, Bound::End)).transpose()
}

fn run(cli: &Cli) -> Result<()> {
    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (db, config) = open_database(cli.config.as_deref())?;
    let user_id = UserId::new(config.user_id).map_err(TrackerError::from)?;
    let broadcaster = Broadcaster::new();
    let ctx = Context {
        db: &db,
        user_id,
        publisher: &broadcaster,
    };
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Task(action) => match action {
            TaskAction::Add {
                title,
                description,
                priority,
                due,
            } => {
                let new = NewTask {
                    title: title.clone(),
                    description: description.clone(),
                    priority: *priority,
                    due_date: due_date(due.as_deref())?,
                };
                task::add(&mut stdout, &ctx, &new)?;
            }
            TaskAction::List { json } => task::list(&mut stdout, &ctx, *json)?,
            TaskAction::Status { task_id, status } => {
                task::set_status(&mut stdout, &ctx, task_id, *status)?;
            }
            TaskAction::Edit {
                task_id,
                title,
                description,
                priority,
                due,
            } => {
                let update = TaskUpdate {
                    title: title.clone(),
                    description: description.clone(),
                    priority: *priority,
                    due_date: due_date(due.as_deref())?,
                };
                task::edit(&mut stdout, &ctx, task_id, &update)?;
            }
            TaskAction::Rm { task_id } => task::remove(&mut stdout, &ctx, task_id)?,
        },
        Commands::Start { task_id } => timer::start(&mut stdout, &ctx, task_id)?,
        Commands::Stop { task_id } => timer::stop(&mut stdout, &ctx, task_id)?,
        Commands::Entries { task_id, json } => {
            timer::entries(&mut stdout, &ctx, task_id, *json)?;
        }
        Commands::Report { range, json } => {
            report::run(&ctx, window(range)?.as_ref(), *json)?;
        }
        Commands::Stats(kind) => match kind {
            StatsKind::Tasks { range, json } => {
                stats::tasks(&ctx, window(range)?.as_ref(), *json)?;
            }
            StatsKind::Time { range, json } => {
                stats::time(&ctx, window(range)?.as_ref(), *json)?;
            }
            StatsKind::Productivity { range, json } => {
                stats::productivity(&ctx, window(range)?.as_ref(), *json)?;
            }
        },
    }

    Ok(())
}

/// Typed failures show only their public message; storage detail goes to the log.
fn report_error(err: &anyhow::Error) {
    if let Some(tracker) = err.downcast_ref::<TrackerError>() {
        tracing::error!(
            error = ?tracker,
            status = tracker.status_code(),
            "command failed"
        );
        eprintln!("error: {}", tracker.public_message());
    } else {
        eprintln!("error: {err:#}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so JSON output on stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}
