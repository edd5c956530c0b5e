//! Crash recovery (spec.md §4.6): run once at startup, before the
//! scheduler loop starts, to close out any run-status thread an unclean
//! shutdown left non-terminal.

use std::sync::Arc;

use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::ports::ChainRepository;

pub async fn fix_scheduler_crash(repo: &Arc<dyn ChainRepository>) -> DomainResult<u64> {
    let fixed = repo.fix_scheduler_crash().await?;
    if fixed > 0 {
        info!(threads_fixed = fixed, "recovered run-status threads left non-terminal by a prior crash");
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteChainRepository};
    use crate::domain::models::{BaseTask, RunAt, TaskChain, TaskKind};
    use crate::domain::models::ChainExecutionConfig;

    #[tokio::test]
    async fn closes_out_a_dangling_started_thread() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool));

        let task = BaseTask::new("noop", TaskKind::Builtin, None);
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();
        let config = ChainExecutionConfig::new(node.chain_id, "orphan", RunAt::Reboot);
        repo.insert_chain_execution_config(&config).await.unwrap();

        let mut tx = repo.start_transaction().await.unwrap();
        repo.insert_chain_run_status(&mut tx, config.id, node.chain_id).await.unwrap();
        repo.commit_transaction(tx).await.unwrap();

        assert!(!repo.can_proceed_chain_execution(config.id, Some(1)).await.unwrap());

        let fixed = fix_scheduler_crash(&repo).await.unwrap();
        assert_eq!(fixed, 1);

        assert!(repo.can_proceed_chain_execution(config.id, Some(1)).await.unwrap());
    }

    #[tokio::test]
    async fn empty_database_is_a_no_op() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool));
        assert_eq!(fix_scheduler_crash(&repo).await.unwrap(), 0);
    }
}
