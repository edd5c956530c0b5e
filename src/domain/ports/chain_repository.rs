//! Repository port for the configuration/status database (spec.md §4.1).
//!
//! A single trait covers both the explicit data-access contract
//! (`StartTransaction` … `LogToDb`) and the admin CRUD operations that
//! external "admin SQL" performs in production but that our test suite
//! and CLI need a typed way to invoke.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    BaseTask, ChainExecutionConfig, ChainExecutionParameters, ChainElementExecution,
    DatabaseConnection, EligibleConfig, ExecutionLogEntry, ExecutionStatus, LogLevel, RunStatus,
    TaskChain,
};

/// A transaction spanning one chain run, held by the [`ChainRepository`]
/// caller for the duration of the run (spec.md §4.3 step 1).
pub type ChainTx = Transaction<'static, Sqlite>;

#[async_trait]
pub trait ChainRepository: Send + Sync {
    /// Open the long-running transaction a chain run executes in.
    async fn start_transaction(&self) -> DomainResult<ChainTx>;

    /// Commit a chain run's transaction. Must never silently discard:
    /// commit failures propagate to the caller.
    async fn commit_transaction(&self, tx: ChainTx) -> DomainResult<()>;

    /// `live = true` configs whose `run_at` fires at or before `now`
    /// and whose `client_name` is `None` or equal to `client_name`.
    async fn select_eligible_configs(
        &self,
        now: DateTime<Utc>,
        client_name: Option<&str>,
    ) -> DomainResult<Vec<EligibleConfig>>;

    /// Steps of the chain rooted at `head_chain_id`, head-to-tail.
    async fn load_chain_elements(
        &self,
        head_chain_id: Uuid,
    ) -> DomainResult<Vec<ChainElementExecution>>;

    /// JSON-array-string parameter sets for one step, ordered by
    /// `order_id` ascending. Empty means "run once with zero args."
    async fn load_chain_params(
        &self,
        config_id: Uuid,
        chain_id: Uuid,
    ) -> DomainResult<Vec<String>>;

    async fn insert_chain_run_status(
        &self,
        tx: &mut ChainTx,
        config_id: Uuid,
        chain_id: Uuid,
    ) -> DomainResult<i64>;

    async fn update_chain_run_status(
        &self,
        tx: &mut ChainTx,
        status: ExecutionStatus,
        run_status_id: i64,
        start_status_id: i64,
        current_execution_element: Option<Uuid>,
    ) -> DomainResult<()>;

    async fn insert_execution_log(
        &self,
        tx: &mut ChainTx,
        entry: &ExecutionLogEntry,
    ) -> DomainResult<()>;

    /// Delete a config (used by self-destruct), stitching any chain
    /// nodes that referenced a deleted base task back together. Returns
    /// `false` if the config did not exist.
    async fn delete_chain_config(&self, config_id: Uuid) -> DomainResult<bool>;

    async fn log_to_db(&self, level: LogLevel, message: &str) -> DomainResult<()>;

    /// Admission query (spec.md §4.4): whether `config_id` may start a
    /// new run right now given `max_instances` (`None` or `Some(0)`
    /// both mean unbounded — see DESIGN.md's Open Question resolution).
    async fn can_proceed_chain_execution(
        &self,
        config_id: Uuid,
        max_instances: Option<u32>,
    ) -> DomainResult<bool>;

    /// Chain-execution-config ids with at least one non-terminal run
    /// thread right now. Used by the admission controller's
    /// `exclusive_execution` / `excluded_execution_configs` rules,
    /// which need the fleet-wide snapshot rather than a single count.
    async fn list_active_run_config_ids(&self) -> DomainResult<Vec<Uuid>>;

    /// Crash recovery (spec.md §4.6): append a `DEAD` row to every
    /// non-terminal run-status thread. Returns the number fixed.
    async fn fix_scheduler_crash(&self) -> DomainResult<u64>;

    /// Count of `base_task` rows with `kind = 'BUILTIN'`, used by the
    /// built-in parity test (spec.md §8 invariant 5).
    async fn count_builtin_base_tasks(&self) -> DomainResult<u64>;

    // -- admin / fixture operations (external admin SQL in production) --

    async fn insert_database_connection(&self, conn: &DatabaseConnection) -> DomainResult<()>;
    async fn get_database_connection(&self, id: Uuid) -> DomainResult<Option<DatabaseConnection>>;
    async fn insert_base_task(&self, task: &BaseTask) -> DomainResult<()>;
    async fn get_base_task(&self, task_id: Uuid) -> DomainResult<Option<BaseTask>>;
    /// Delete a base task, stitching any chain it appears in back
    /// together (spec.md §9's linked-list surgery).
    async fn delete_base_task(&self, task_id: Uuid) -> DomainResult<()>;
    async fn insert_task_chain(&self, node: &TaskChain) -> DomainResult<()>;
    async fn insert_chain_execution_config(
        &self,
        config: &ChainExecutionConfig,
    ) -> DomainResult<()>;
    async fn insert_chain_execution_parameters(
        &self,
        params: &ChainExecutionParameters,
    ) -> DomainResult<()>;
    async fn get_chain_execution_config(
        &self,
        config_id: Uuid,
    ) -> DomainResult<Option<ChainExecutionConfig>>;
    async fn list_chain_execution_configs(&self) -> DomainResult<Vec<ChainExecutionConfig>>;

    /// Most recently written row of the run thread belonging to
    /// `config_id`, if any run has ever been started for it. Used by
    /// the inspection CLI's `run-status show`.
    async fn latest_run_status_for_config(
        &self,
        config_id: Uuid,
    ) -> DomainResult<Option<RunStatus>>;
}
