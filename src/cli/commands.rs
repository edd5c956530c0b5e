//! Handlers for each CLI subcommand.

use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::Cell;
use serde::Serialize;

use crate::application::{AdmissionController, AuditLog, SchedulerLoop, TaskDispatcher};
use crate::application::recovery::fix_scheduler_crash;
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::LogLevel;
use crate::domain::ports::{BuiltinRegistry, ChainRepository};

/// `scheduler run`: recover crashed threads, then tick until a signal.
pub async fn handle_scheduler_run(
    repo: Arc<dyn ChainRepository>,
    dispatcher: TaskDispatcher,
    config: crate::application::SchedulerConfig,
    client_name: Option<String>,
    verbose: bool,
) -> Result<()> {
    let audit = AuditLog::new(repo.clone(), verbose);

    let fixed = fix_scheduler_crash(&repo).await.context("crash recovery failed")?;
    if fixed > 0 {
        tracing::info!(threads_fixed = fixed, "startup recovery");
    }
    audit.log(LogLevel::User, "scheduler starting").await?;

    let scheduler = SchedulerLoop::new(repo, dispatcher, config, client_name);
    let handle = scheduler.start();

    wait_for_shutdown_signal().await?;
    tracing::info!("shutdown signal received, stopping scheduler loop");
    scheduler.stop();
    let _ = handle.await;
    audit.log(LogLevel::User, "scheduler stopped").await?;

    Ok(())
}

/// `scheduler recover`: run crash recovery once and exit.
pub async fn handle_scheduler_recover(repo: Arc<dyn ChainRepository>, json: bool) -> Result<()> {
    let fixed = fix_scheduler_crash(&repo).await.context("crash recovery failed")?;
    output(&RecoverOutput { threads_fixed: fixed }, json);
    Ok(())
}

/// `task list`: every registered base task.
pub async fn handle_task_list(repo: Arc<dyn ChainRepository>, json: bool) -> Result<()> {
    let configs = repo.list_chain_execution_configs().await?;
    let mut tasks = Vec::new();
    for config in &configs {
        let elements = repo.load_chain_elements(config.chain_id).await?;
        for element in elements {
            tasks.push(TaskRow {
                name: element.task_name,
                kind: element.kind.as_str().to_string(),
                chain_name: config.chain_name.clone(),
            });
        }
    }
    output(&TaskListOutput { tasks }, json);
    Ok(())
}

/// `run-status show <chain_name>`: the latest run thread started by
/// the config with that name.
pub async fn handle_run_status_show(
    repo: Arc<dyn ChainRepository>,
    chain_name: String,
    json: bool,
) -> Result<()> {
    let configs = repo.list_chain_execution_configs().await?;
    let Some(config) = configs.into_iter().find(|c| c.chain_name == chain_name) else {
        anyhow::bail!("no chain_execution_config named '{chain_name}'");
    };

    let status = repo.latest_run_status_for_config(config.id).await?;
    output(
        &RunStatusOutput {
            chain_name: config.chain_name,
            status: status.map(|s| s.execution_status.as_str().to_string()),
        },
        json,
    );
    Ok(())
}

/// Builds the dispatcher's built-in registry. Empty unless the embedding
/// process registers implementations before launch (spec.md §4.2).
pub fn default_builtin_registry() -> Arc<BuiltinRegistry> {
    Arc::new(BuiltinRegistry::new())
}

pub fn admission_controller(repo: Arc<dyn ChainRepository>) -> AdmissionController {
    AdmissionController::new(repo)
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RecoverOutput {
    threads_fixed: u64,
}

impl CommandOutput for RecoverOutput {
    fn to_human(&self) -> String {
        format!("recovered {} non-terminal run-status thread(s)", self.threads_fixed)
    }
}

#[derive(Debug, Serialize)]
struct TaskRow {
    name: String,
    kind: String,
    chain_name: String,
}

#[derive(Debug, Serialize)]
struct TaskListOutput {
    tasks: Vec<TaskRow>,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut table = list_table(&["name", "kind", "chain"]);
        for task in &self.tasks {
            table.add_row(vec![
                Cell::new(&task.name),
                Cell::new(&task.kind),
                Cell::new(&task.chain_name),
            ]);
        }
        format!("{} task(s):\n{table}", self.tasks.len())
    }
}

#[derive(Debug, Serialize)]
struct RunStatusOutput {
    chain_name: String,
    status: Option<String>,
}

impl CommandOutput for RunStatusOutput {
    fn to_human(&self) -> String {
        match &self.status {
            Some(status) => format!("{}: {}", self.chain_name, status),
            None => format!("{}: never run", self.chain_name),
        }
    }
}
