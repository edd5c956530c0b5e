//! Chain execution parameters domain model.
//!
//! Parameter sets for one chain step, keyed by `(chain_execution_config,
//! chain_id)` and ordered by `order_id` ascending (spec.md §3 invariant 3).
//! `value` is a JSON array passed positionally to the dispatched task.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExecutionParameters {
    pub chain_execution_config: Uuid,
    pub chain_id: Uuid,
    pub order_id: i64,
    pub value: Value,
}

impl ChainExecutionParameters {
    pub fn new(chain_execution_config: Uuid, chain_id: Uuid, order_id: i64, value: Value) -> Self {
        Self {
            chain_execution_config,
            chain_id,
            order_id,
            value,
        }
    }

    /// Serialized JSON-array text as stored/transported, per spec.md §4.1's
    /// `LoadChainParams(configID, chainID) → [string]` contract.
    pub fn value_json(&self) -> String {
        self.value.to_string()
    }
}
