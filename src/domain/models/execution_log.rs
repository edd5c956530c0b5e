//! Execution log domain model — append-only per-step history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub chain_id: Uuid,
    pub task_id: Uuid,
    pub name: String,
    pub script: Option<String>,
    pub kind: String,
    pub last_run: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub returncode: i32,
    /// PID of the agent process that ran this step (not the spawned
    /// subprocess — the scheduler process itself, per spec.md §3).
    pub pid: u32,
}
