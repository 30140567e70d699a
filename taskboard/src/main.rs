//! Command-line client for a realtime task board.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/taskboard/config.toml`).
//!
//! ```bash
//! # List projects
//! TASKBOARD_TOKEN=dev cargo run --bin taskboard -- projects
//!
//! # Move a task, then follow the project live
//! cargo run --bin taskboard -- --token dev move <task-id> done
//! cargo run --bin taskboard -- --token dev watch <project-id>
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use futures_util::future::AbortHandle;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::api::{self, ApiError, HttpTaskApi};
use taskboard::board::BoardSession;
use taskboard::config::{CliArgs, ClientConfig, Command};
use taskboard::realtime::{LinkState, RealtimeClient, TransportError};
use taskboard::store::{StoreError, TaskStore, TracingNotifier};
use taskboard::sync::SyncBinding;
use taskboard_proto::{ProjectId, Task, codec};

type Store = TaskStore<HttpTaskApi, TracingNotifier>;

/// Failures surfaced to the user by the CLI.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// No token from `--token`, `TASKBOARD_TOKEN` or the config file.
    #[error("no API token; pass --token or set TASKBOARD_TOKEN")]
    MissingToken,

    /// A REST call failed outside the store.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A store operation was rejected.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The realtime endpoint is misconfigured.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The realtime connection gave up reconnecting.
    #[error("realtime connection lost")]
    ConnectionLost,

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok((c, skipped)) => {
            if let Some(e) = skipped {
                eprintln!("Warning: ignoring config file: {e}");
            }
            c
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let Some(command) = cli.command else {
        let _ = CliArgs::command().print_help();
        return ExitCode::from(2);
    };

    tracing::info!(?command, "taskboard starting");
    match run(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(err = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Stdout carries command output, so logs go to a file. Returns a
/// [`WorkerGuard`] that must be held until shutdown to flush buffered entries.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: ClientConfig) -> Result<(), CliError> {
    let token = config.token.clone().ok_or(CliError::MissingToken)?;
    let store = Arc::new(TaskStore::new(
        HttpTaskApi::new(&config.api, token.clone())?,
        TracingNotifier,
    ));

    match command {
        Command::Projects => list_projects(store.api()).await,
        Command::Tasks { project } => {
            let mut session = BoardSession::new(project, Arc::clone(&store));
            session.load().await?;
            for lane in session.lanes() {
                println!("{} ({})", lane.column.title, lane.tasks.len());
                for task in &lane.tasks {
                    println!("  {}", task_line(task));
                }
            }
            Ok(())
        }
        Command::Columns { project } => {
            for column in store.load_columns(&project).await? {
                println!("{}\t{}", column.id, column.title);
            }
            Ok(())
        }
        Command::Move {
            task,
            column,
            position,
        } => print_task(&store.move_task(&task, column, position).await?),
        Command::Complete { task } => print_task(&store.complete_task(&task).await?),
        Command::Uncomplete { task } => print_task(&store.uncomplete_task(&task).await?),
        Command::Delete { task } => {
            store.delete_task(&task).await?;
            println!("deleted {task}");
            Ok(())
        }
        Command::Watch { project } => watch(&config, &token, store, &project).await,
    }
}

/// Lists projects; Ctrl-C aborts the request.
async fn list_projects(api: &HttpTaskApi) -> Result<(), CliError> {
    let (abort, registration) = AbortHandle::new_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });
    let projects = api::fetch_projects(api, registration).await;
    interrupt.abort();

    for project in projects? {
        println!("{}\t{}", project.id, project.name);
    }
    Ok(())
}

/// Follows a project over the realtime link, printing each applied event.
async fn watch(
    config: &ClientConfig,
    token: &str,
    store: Arc<Store>,
    project: &ProjectId,
) -> Result<(), CliError> {
    let client = RealtimeClient::spawn(config.ws_connector()?, config.backoff);
    let mut state = client.watch_state();
    client.connect(token);

    store.load_project(project).await?;
    let binding = SyncBinding::attach_with(&client, store, |event| match codec::encode(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(err = %e, "failed to encode event"),
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut joined = false;
    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = state.changed() => {
                if changed.is_err() {
                    break Err(CliError::ConnectionLost);
                }
                let current = *state.borrow_and_update();
                eprintln!("realtime: {current}");
                match current {
                    LinkState::Connected if !joined => {
                        client.join_project(project);
                        joined = true;
                    }
                    LinkState::Disconnected => break Err(CliError::ConnectionLost),
                    _ => {}
                }
            }
        }
    };

    binding.detach(&client);
    client.disconnect();
    outcome
}

fn task_line(task: &Task) -> String {
    let done = if task.is_completed() { " (done)" } else { "" };
    format!("{}  [{}] {}{done}", task.id, task.priority, task.title)
}

fn print_task(task: &Task) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(task)?);
    Ok(())
}
