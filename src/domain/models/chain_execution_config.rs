//! Chain execution config domain model.
//!
//! The scheduling envelope around a chain: when it fires, how many
//! concurrent instances it may have, and which other configs it
//! excludes or is excluded by.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run_at::RunAt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExecutionConfig {
    pub id: Uuid,
    /// Head `chain_id` of the linked list this config runs.
    pub chain_id: Uuid,
    /// Unique display name.
    pub chain_name: String,
    pub run_at: RunAt,
    /// `None` means unbounded (spec.md §9 Open Question, resolved in
    /// DESIGN.md: NULL == unbounded concurrency for this config).
    pub max_instances: Option<u32>,
    pub live: bool,
    pub self_destruct: bool,
    pub exclusive_execution: bool,
    pub excluded_execution_configs: Vec<Uuid>,
    /// Restricts execution to agents advertising this client tag.
    pub client_name: Option<String>,
}

impl ChainExecutionConfig {
    pub fn new(chain_id: Uuid, chain_name: impl Into<String>, run_at: RunAt) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain_id,
            chain_name: chain_name.into(),
            run_at,
            max_instances: Some(1),
            live: true,
            self_destruct: false,
            exclusive_execution: false,
            excluded_execution_configs: Vec::new(),
            client_name: None,
        }
    }

    /// Whether this config is eligible at all for the given agent's
    /// client tag (spec.md §4.4's client-tag admission rule).
    pub fn matches_client(&self, agent_client_name: Option<&str>) -> bool {
        match &self.client_name {
            None => true,
            Some(required) => agent_client_name == Some(required.as_str()),
        }
    }
}

/// Row shape produced by `SelectEligibleConfigs`, pairing a config with
/// the bookkeeping the scheduler loop needs to evaluate `@after`.
#[derive(Debug, Clone)]
pub struct EligibleConfig {
    pub config: ChainExecutionConfig,
    pub last_completed_at: Option<DateTime<Utc>>,
}
