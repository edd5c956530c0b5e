//! Built-in task registry port (spec.md §4.2, §6).
//!
//! A `BaseTask` of kind `Builtin` selects a registered implementation
//! by name; the implementation itself is opaque to the scheduler core
//! — it is supplied by whoever embeds this crate.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// A single built-in task implementation.
#[async_trait]
pub trait BuiltinTask: Send + Sync {
    /// Run the built-in with the step's raw JSON-array parameter-set
    /// strings, passed through unchanged (spec.md §4.2). Returns the
    /// same `(exit_code, error)` shape as SQL/SHELL dispatch.
    async fn execute(&self, param_values: &[String]) -> DomainResult<i32>;
}

/// Process-local `name -> implementation` map.
#[derive(Default, Clone)]
pub struct BuiltinRegistry {
    implementations: std::collections::HashMap<String, std::sync::Arc<dyn BuiltinTask>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, task: std::sync::Arc<dyn BuiltinTask>) {
        self.implementations.insert(name.into(), task);
    }

    pub fn get(&self, name: &str) -> Option<std::sync::Arc<dyn BuiltinTask>> {
        self.implementations.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}
