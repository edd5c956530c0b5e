//! Base task domain model.
//!
//! A `BaseTask` is one reusable unit of work: an SQL script, a shell
//! command, or a named built-in implementation. Chains are built by
//! linking base tasks together (see [`super::task_chain`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The backend a base task dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskKind {
    Sql,
    Shell,
    Builtin,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "SQL",
            Self::Shell => "SHELL",
            Self::Builtin => "BUILTIN",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SQL" => Some(Self::Sql),
            "SHELL" => Some(Self::Shell),
            "BUILTIN" => Some(Self::Builtin),
            _ => None,
        }
    }
}

/// A registered unit of work. `script` is the SQL text or shell command
/// line for `Sql`/`Shell` kinds; for `Builtin` it is unused and `name`
/// selects the registered implementation instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseTask {
    pub id: Uuid,
    /// Unique task name.
    pub name: String,
    pub kind: TaskKind,
    /// Non-null for `Sql`/`Shell`; ignored for `Builtin`.
    pub script: Option<String>,
}

impl BaseTask {
    pub fn new(name: impl Into<String>, kind: TaskKind, script: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            script,
        }
    }

    /// Invariant from spec.md §3: `script` must be present unless the
    /// task is a `Builtin`.
    pub fn is_valid(&self) -> bool {
        matches!(self.kind, TaskKind::Builtin) || self.script.is_some()
    }
}
