//! Admission controller (spec.md §4.4): decides whether an eligible
//! config may start a new chain run right now. The database is the only
//! source of truth — several agents may share the same config DB, so no
//! in-memory fleet view is kept here.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ChainExecutionConfig;
use crate::domain::ports::ChainRepository;

pub struct AdmissionController {
    repo: Arc<dyn ChainRepository>,
}

impl AdmissionController {
    pub fn new(repo: Arc<dyn ChainRepository>) -> Self {
        Self { repo }
    }

    /// Evaluate all five rules from spec.md §4.4 for `config` against the
    /// agent's own `client_name` tag.
    pub async fn can_proceed(
        &self,
        config: &ChainExecutionConfig,
        agent_client_name: Option<&str>,
    ) -> DomainResult<bool> {
        if !config.live {
            debug!(config = %config.id, "admission rejected: not live");
            return Ok(false);
        }

        if !config.matches_client(agent_client_name) {
            debug!(config = %config.id, "admission rejected: client_name mismatch");
            return Ok(false);
        }

        let active = self.repo.list_active_run_config_ids().await?;

        if config.exclusive_execution && !active.is_empty() {
            debug!(config = %config.id, "admission deferred: exclusive_execution, other runs active");
            return Ok(false);
        }

        if active.iter().any(|id: &Uuid| config.excluded_execution_configs.contains(id)) {
            debug!(config = %config.id, "admission deferred: an excluded config is active");
            return Ok(false);
        }

        let within_limit = self.repo.can_proceed_chain_execution(config.id, config.max_instances).await?;
        if !within_limit {
            debug!(config = %config.id, "admission deferred: max_instances reached");
            return Ok(false);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteChainRepository};
    use crate::domain::models::{BaseTask, RunAt, TaskChain, TaskKind};

    async fn setup() -> (Arc<dyn ChainRepository>, ChainExecutionConfig) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool));

        let task = BaseTask::new("noop", TaskKind::Builtin, None);
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();

        let config = ChainExecutionConfig::new(node.chain_id, "nightly", RunAt::Every { interval_secs: 3600 });
        repo.insert_chain_execution_config(&config).await.unwrap();

        (repo, config)
    }

    #[tokio::test]
    async fn admits_a_fresh_live_config() {
        let (repo, config) = setup().await;
        let controller = AdmissionController::new(repo);
        assert!(controller.can_proceed(&config, None).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_non_live_config() {
        let (repo, mut config) = setup().await;
        config.live = false;
        let controller = AdmissionController::new(repo);
        assert!(!controller.can_proceed(&config, None).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_client_name_mismatch() {
        let (repo, mut config) = setup().await;
        config.client_name = Some("gpu-worker".to_string());
        let controller = AdmissionController::new(repo);
        assert!(!controller.can_proceed(&config, Some("cpu-worker")).await.unwrap());
        assert!(controller.can_proceed(&config, Some("gpu-worker")).await.unwrap());
    }

    #[tokio::test]
    async fn empty_database_allows_zero_max_instances() {
        // spec.md §8 invariant 4: CanProceedChainExecution(0, 0) = true on an empty DB.
        let (repo, config) = setup().await;
        assert!(repo.can_proceed_chain_execution(config.id, Some(0)).await.unwrap());
        assert!(repo.can_proceed_chain_execution(config.id, None).await.unwrap());
    }

    #[tokio::test]
    async fn exclusive_execution_is_deferred_while_any_run_is_active() {
        // spec.md §8 scenario S5: config A (exclusive) is not admitted
        // while config B is active, even though A has no direct relation
        // to B via `excluded_execution_configs`.
        let (repo, mut config_a) = setup().await;
        config_a.chain_name = "exclusive-a".to_string();
        config_a.exclusive_execution = true;

        let task_b = BaseTask::new("b-task", TaskKind::Builtin, None);
        repo.insert_base_task(&task_b).await.unwrap();
        let node_b = TaskChain::new(task_b.id);
        repo.insert_task_chain(&node_b).await.unwrap();
        let config_b = ChainExecutionConfig::new(node_b.chain_id, "normal-b", RunAt::Reboot);
        repo.insert_chain_execution_config(&config_b).await.unwrap();

        let mut tx = repo.start_transaction().await.unwrap();
        repo.insert_chain_run_status(&mut tx, config_b.id, node_b.chain_id).await.unwrap();
        repo.commit_transaction(tx).await.unwrap();

        let controller = AdmissionController::new(repo);
        assert!(!controller.can_proceed(&config_a, None).await.unwrap());
    }
}
