//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise store, repositories and orchestrator from a real binary.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `todoc_cli [DB_PATH] [ORDER] [NEW_TASK_PROJECT_ID NEW_TASK_NAME]`
//! where `ORDER` is one of `none|az|za|recent|old`.

use log::error;
use std::process::ExitCode;
use todoc_core::logging::{init_logging_with, LogConfig};
use todoc_core::{
    orchestrator_for, task_rows, OrchestratorError, Task, TaskOrder, TaskStore,
};

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("todoc: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    if let Some(config) = LogConfig::from_env()? {
        init_logging_with(config)?;
    }
    println!("todoc_core version={}", todoc_core::core_version());

    let store = match args.first().map(String::as_str) {
        None | Some(":memory:") => TaskStore::open_in_memory(),
        Some(path) => TaskStore::open(path),
    }
    .map_err(|err| format!("failed to open store: {err}"))?;

    let order = match args.get(1) {
        Some(value) => TaskOrder::parse(value).ok_or_else(|| format!("unknown order `{value}`"))?,
        None => TaskOrder::None,
    };

    let orchestrator = orchestrator_for(&store).map_err(|err| err.to_string())?;
    orchestrator.init();

    if let (Some(project_id), Some(name)) = (args.get(2), args.get(3)) {
        let project_id = project_id
            .parse()
            .map_err(|_| format!("invalid project id `{project_id}`"))?;
        orchestrator
            .create_task(Task::new(project_id, name.as_str()))
            .wait()
            .map_err(|err| format!("failed to create task: {err}"))?;
    }

    let projects = orchestrator
        .get_all_projects()
        .and_then(|observable| observable.current().map_err(OrchestratorError::from))
        .map_err(|err| err.to_string())?;
    for project in &projects {
        println!(
            "project id={} color=#{:08X} name={}",
            project.id, project.color, project.name
        );
    }

    let index = orchestrator.project_index().map_err(|err| err.to_string())?;
    let tasks = orchestrator
        .get_all_tasks()
        .current()
        .map_err(|err| err.to_string())?;
    for row in task_rows(&tasks, &index, order) {
        let project_name = row
            .project
            .as_ref()
            .map_or("<unknown>", |project| project.name.as_str());
        println!(
            "task id={} selected={} created={} project={} name={}",
            row.task.id, row.task.selected, row.task.creation_timestamp, project_name, row.task.name
        );
    }

    Ok(())
}
