//! Chain runner (spec.md §4.3): executes one admitted chain run to
//! completion, step by step, inside a single long-running transaction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::application::dispatcher::TaskDispatcher;
use crate::domain::errors::DomainResult;
use crate::domain::models::{ChainExecutionConfig, ExecutionLogEntry, ExecutionStatus};
use crate::domain::ports::ChainRepository;

/// Cooperative cancellation flag, checked only between steps — a
/// cancellation mid-step is never honored (spec.md §4.3).
pub type CancelFlag = Arc<AtomicBool>;

pub struct ChainRunner {
    repo: Arc<dyn ChainRepository>,
    dispatcher: TaskDispatcher,
}

impl ChainRunner {
    pub fn new(repo: Arc<dyn ChainRepository>, dispatcher: TaskDispatcher) -> Self {
        Self { repo, dispatcher }
    }

    #[instrument(skip(self, config, cancel), fields(config_id = %config.id, chain_id = %config.chain_id))]
    pub async fn run(&self, config: &ChainExecutionConfig, cancel: CancelFlag) -> DomainResult<ExecutionStatus> {
        let pid = std::process::id();
        let mut tx = self.repo.start_transaction().await?;
        let run_status_id = self.repo.insert_chain_run_status(&mut tx, config.id, config.chain_id).await?;
        let start_status_id = run_status_id;
        self.repo.commit_transaction(tx).await?;

        let elements = self.repo.load_chain_elements(config.chain_id).await?;
        info!(steps = elements.len(), "starting chain run");

        let mut final_status = ExecutionStatus::ChainDone;

        for element in &elements {
            if cancel.load(Ordering::SeqCst) {
                warn!(chain_id = %element.chain_id, "cancellation observed at step boundary");
                final_status = ExecutionStatus::Dead;
                break;
            }

            let param_values = self.repo.load_chain_params(config.id, element.chain_id).await?;
            let connection = match element.database_connection {
                Some(id) => Some(self.repo.get_database_connection(id).await?.ok_or_else(|| {
                    crate::domain::errors::DomainError::ValidationFailed(format!(
                        "database_connection {id} referenced by chain {} does not exist",
                        element.chain_id
                    ))
                })?),
                None => None,
            };

            let started_at = Utc::now();
            // BUILTIN steps select their registered implementation by
            // `task_name`, not `script` (`BaseTask::is_valid`, spec.md
            // §3: script is unused for BUILTIN); SQL/SHELL dispatch off
            // the step's own script text.
            let dispatch_arg = match element.kind {
                crate::domain::models::TaskKind::Builtin => Some(element.task_name.as_str()),
                _ => element.script.as_deref(),
            };
            let outcome = self
                .dispatcher
                .execute(
                    element.kind,
                    dispatch_arg,
                    connection.as_ref().map(|c| (c.id, c.connect_string.as_str())),
                    &param_values,
                )
                .await?;
            let finished_at = Utc::now();

            let mut tx = self.repo.start_transaction().await?;
            self.repo
                .insert_execution_log(
                    &mut tx,
                    &ExecutionLogEntry {
                        chain_id: element.chain_id,
                        task_id: element.task_id,
                        name: element.task_name.clone(),
                        script: element.script.clone(),
                        kind: element.kind.as_str().to_string(),
                        last_run: started_at,
                        finished: finished_at,
                        returncode: outcome.exit_code,
                        pid,
                    },
                )
                .await?;
            self.repo.commit_transaction(tx).await?;

            if let Some(err) = &outcome.error {
                if element.ignore_error {
                    warn!(task = %element.task_name, error = %err, "step failed, ignore_error is set, continuing");
                } else {
                    error!(task = %element.task_name, error = %err, "step failed, aborting chain run");
                    final_status = ExecutionStatus::ChainFailed;
                    let mut tx = self.repo.start_transaction().await?;
                    self.repo
                        .update_chain_run_status(
                            &mut tx,
                            ExecutionStatus::ChainFailed,
                            run_status_id,
                            start_status_id,
                            Some(element.chain_id),
                        )
                        .await?;
                    self.repo.commit_transaction(tx).await?;
                    return Ok(final_status);
                }
            }
        }

        let mut tx = self.repo.start_transaction().await?;
        self.repo
            .update_chain_run_status(
                &mut tx,
                final_status,
                run_status_id,
                start_status_id,
                elements.last().map(|e| e.chain_id),
            )
            .await?;
        self.repo.commit_transaction(tx).await?;

        if final_status == ExecutionStatus::ChainDone && config.self_destruct {
            info!(config_id = %config.id, "self_destruct: deleting chain execution config");
            self.repo.delete_chain_config(config.id).await?;
        }

        Ok(final_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteChainRepository};
    use crate::application::dispatcher::TaskDispatcher;
    use crate::domain::models::{BaseTask, RunAt, TaskChain, TaskKind};
    use crate::domain::ports::BuiltinRegistry;

    async fn setup() -> (Arc<dyn ChainRepository>, TaskDispatcher) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool.clone()));
        let dispatcher = TaskDispatcher::new(pool, Arc::new(BuiltinRegistry::new()));
        (repo, dispatcher)
    }

    #[tokio::test]
    async fn single_shell_step_completes_chain_done() {
        let (repo, dispatcher) = setup().await;

        let task = BaseTask::new("echo-ok", TaskKind::Shell, Some("true".to_string()));
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();
        let config = ChainExecutionConfig::new(node.chain_id, "s1", RunAt::Reboot);
        repo.insert_chain_execution_config(&config).await.unwrap();

        let runner = ChainRunner::new(repo, dispatcher);
        let status = runner.run(&config, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(status, ExecutionStatus::ChainDone);
    }

    #[tokio::test]
    async fn failing_step_without_ignore_error_fails_chain() {
        let (repo, dispatcher) = setup().await;

        let task = BaseTask::new("fail", TaskKind::Shell, Some("false".to_string()));
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();
        let config = ChainExecutionConfig::new(node.chain_id, "s2", RunAt::Reboot);
        repo.insert_chain_execution_config(&config).await.unwrap();

        let runner = ChainRunner::new(repo, dispatcher);
        let status = runner.run(&config, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(status, ExecutionStatus::ChainFailed);
    }

    #[tokio::test]
    async fn failing_step_with_ignore_error_continues_chain() {
        let (repo, dispatcher) = setup().await;

        let failing = BaseTask::new("fail", TaskKind::Shell, Some("false".to_string()));
        repo.insert_base_task(&failing).await.unwrap();
        let mut head = TaskChain::new(failing.id);
        head.ignore_error = true;
        repo.insert_task_chain(&head).await.unwrap();

        let succeeding = BaseTask::new("ok", TaskKind::Shell, Some("true".to_string()));
        repo.insert_base_task(&succeeding).await.unwrap();
        let mut tail = TaskChain::new(succeeding.id);
        tail.parent_id = Some(head.chain_id);
        repo.insert_task_chain(&tail).await.unwrap();

        let config = ChainExecutionConfig::new(head.chain_id, "s3", RunAt::Reboot);
        repo.insert_chain_execution_config(&config).await.unwrap();

        let runner = ChainRunner::new(repo, dispatcher);
        let status = runner.run(&config, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(status, ExecutionStatus::ChainDone);
    }

    #[tokio::test]
    async fn self_destruct_deletes_config_after_chain_done() {
        let (repo, dispatcher) = setup().await;

        let task = BaseTask::new("echo-ok", TaskKind::Shell, Some("true".to_string()));
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();
        let mut config = ChainExecutionConfig::new(node.chain_id, "one-shot", RunAt::Reboot);
        config.self_destruct = true;
        repo.insert_chain_execution_config(&config).await.unwrap();

        let runner = ChainRunner::new(repo.clone(), dispatcher);
        let status = runner.run(&config, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(status, ExecutionStatus::ChainDone);

        assert!(repo.get_chain_execution_config(config.id).await.unwrap().is_none());
    }

    struct AlwaysOk;

    #[async_trait::async_trait]
    impl crate::domain::ports::BuiltinTask for AlwaysOk {
        async fn execute(&self, _param_values: &[String]) -> DomainResult<i32> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn builtin_step_is_looked_up_by_task_name_not_script() {
        // A real BUILTIN base task has script = None; the registry key
        // lives in its name. Run it through the full runner (not the
        // dispatcher directly) to exercise the wiring between
        // `ChainElementExecution` and `TaskDispatcher::execute`.
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool.clone()));
        let mut registry = BuiltinRegistry::new();
        registry.register("noop", Arc::new(AlwaysOk));
        let dispatcher = TaskDispatcher::new(pool, Arc::new(registry));

        let task = BaseTask::new("noop", TaskKind::Builtin, None);
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();
        let config = ChainExecutionConfig::new(node.chain_id, "builtin-chain", RunAt::Reboot);
        repo.insert_chain_execution_config(&config).await.unwrap();

        let runner = ChainRunner::new(repo, dispatcher);
        let status = runner.run(&config, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(status, ExecutionStatus::ChainDone);
    }
}
