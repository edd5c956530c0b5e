//! Run status domain model — the run-thread state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal and non-terminal states of a chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Started,
    ChainFailed,
    ChainDone,
    Dead,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::ChainFailed => "CHAIN_FAILED",
            Self::ChainDone => "CHAIN_DONE",
            Self::Dead => "DEAD",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STARTED" => Some(Self::Started),
            "CHAIN_FAILED" => Some(Self::ChainFailed),
            "CHAIN_DONE" => Some(Self::ChainDone),
            "DEAD" => Some(Self::Dead),
            _ => None,
        }
    }

    /// Terminal states are the three a run thread ends in; `Started`
    /// is the only non-terminal state (spec.md §3 invariant 2).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// One row of the `run_status` append log. A run thread is the set of
/// rows sharing a `start_status` id; the thread's current state is its
/// most recently inserted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_status: i64,
    /// `run_status` of this thread's initial `STARTED` row.
    pub start_status: i64,
    pub execution_status: ExecutionStatus,
    pub chain_id: Uuid,
    /// The step currently executing (or last attempted) when this row
    /// was written.
    pub current_execution_element: Option<Uuid>,
    pub started: DateTime<Utc>,
    pub last_status_update: DateTime<Utc>,
    pub chain_execution_config: Uuid,
}
