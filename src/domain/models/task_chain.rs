//! Task chain domain model.
//!
//! A `TaskChain` row is one node in a singly-linked list discovered by
//! following `parent_id`. The head (the node whose `parent_id` is
//! `None`) is the entry point a [`super::chain_execution_config::ChainExecutionConfig`]
//! references. Uniqueness of `parent_id` at the storage layer enforces
//! "at most one child" — the structure is a path, never a tree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bound on how many hops a chain walk may take before it is treated
/// as corrupt (spec.md §8, invariant 6 / §9's cursor-walk guidance).
pub const MAX_CHAIN_HOPS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskChain {
    pub chain_id: Uuid,
    /// `None` marks this node as the head of its chain.
    pub parent_id: Option<Uuid>,
    pub task_id: Uuid,
    /// Optional run-as identity recorded for audit purposes.
    pub run_uid: Option<String>,
    /// Database to execute this step's SQL against; `None` means the
    /// configuration database itself.
    pub database_connection: Option<Uuid>,
    /// If true, a failure of this step does not stop the chain run.
    pub ignore_error: bool,
}

impl TaskChain {
    pub fn new(task_id: Uuid) -> Self {
        Self {
            chain_id: Uuid::new_v4(),
            parent_id: None,
            task_id,
            run_uid: None,
            database_connection: None,
            ignore_error: false,
        }
    }

    pub fn is_head(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One step of a chain, joined with its `BaseTask` so a caller can
/// dispatch it without a second lookup. Returned in head-to-tail order
/// by `ChainRepository::load_chain_elements`.
#[derive(Debug, Clone)]
pub struct ChainElementExecution {
    pub chain_id: Uuid,
    pub task_id: Uuid,
    pub task_name: String,
    pub kind: super::base_task::TaskKind,
    pub script: Option<String>,
    pub database_connection: Option<Uuid>,
    pub ignore_error: bool,
}
