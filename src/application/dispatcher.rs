//! Task dispatcher (spec.md §4.2): a uniform `Execute` contract over the
//! three task kinds a chain step can carry.

use std::process::Stdio;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::TaskKind;
use crate::domain::ports::BuiltinRegistry;

/// Result of dispatching one parameter set against one step. `error` is
/// set whenever `exit_code != 0` or the dispatch itself failed to run.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub exit_code: i32,
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl DispatchOutcome {
    fn ok() -> Self {
        Self { exit_code: 0, error: None, stdout: String::new(), stderr: String::new() }
    }

    fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self { exit_code, error: Some(error.into()), stdout: String::new(), stderr: String::new() }
    }
}

/// Dispatches SQL, SHELL, and BUILTIN task kinds. Holds only handles to
/// shared resources (pool, registry); safe to clone across chain runners.
#[derive(Clone)]
pub struct TaskDispatcher {
    config_pool: SqlitePool,
    builtins: Arc<BuiltinRegistry>,
}

impl TaskDispatcher {
    pub fn new(config_pool: SqlitePool, builtins: Arc<BuiltinRegistry>) -> Self {
        Self { config_pool, builtins }
    }

    /// Dispatch one step. `param_values` is the raw JSON-array-string list
    /// loaded via `ChainRepository::load_chain_params`; an empty list is
    /// treated as one invocation with zero arguments (spec.md §4.2).
    #[instrument(skip(self, script, param_values), fields(kind = ?kind))]
    pub async fn execute(
        &self,
        kind: TaskKind,
        script: Option<&str>,
        database_connection: Option<(Uuid, &str)>,
        param_values: &[String],
    ) -> DomainResult<DispatchOutcome> {
        match kind {
            TaskKind::Sql => self.execute_sql(script, database_connection, param_values).await,
            TaskKind::Shell => self.execute_shell(script, param_values).await,
            TaskKind::Builtin => self.execute_builtin(script, param_values).await,
        }
    }

    async fn execute_sql(
        &self,
        script: Option<&str>,
        database_connection: Option<(Uuid, &str)>,
        param_values: &[String],
    ) -> DomainResult<DispatchOutcome> {
        let script = script.ok_or_else(|| DomainError::InvalidInput("SQL step has no script".into()))?;

        let pool = match database_connection {
            Some((_, connect_string)) => {
                sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(connect_string)
                    .await
                    .map_err(DomainError::from)?
            }
            None => self.config_pool.clone(),
        };

        let invocations: Vec<Vec<serde_json::Value>> = if param_values.is_empty() {
            vec![Vec::new()]
        } else {
            param_values
                .iter()
                .map(|v| serde_json::from_str(v))
                .collect::<Result<_, _>>()
                .map_err(DomainError::from)?
        };

        for args in invocations {
            let mut query = sqlx::query(script);
            for arg in &args {
                query = bind_json_value(query, arg);
            }
            if let Err(e) = query.execute(&pool).await {
                return Ok(DispatchOutcome::failed(-1, e.to_string()));
            }
        }

        Ok(DispatchOutcome::ok())
    }

    async fn execute_shell(
        &self,
        script: Option<&str>,
        param_values: &[String],
    ) -> DomainResult<DispatchOutcome> {
        let script = script
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| DomainError::InvalidInput("SHELL step has an empty command".into()))?;

        let invocations: Vec<Vec<String>> = if param_values.is_empty() {
            vec![Vec::new()]
        } else {
            param_values
                .iter()
                .map(|v| serde_json::from_str(v))
                .collect::<Result<_, _>>()
                .map_err(DomainError::from)?
        };

        let mut last = DispatchOutcome::ok();
        for args in invocations {
            debug!(command = %script, ?args, "spawning shell step");
            let output = Command::new(script)
                .args(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await;

            last = match output {
                Ok(output) => {
                    let exit_code = output.status.code().unwrap_or(-1);
                    DispatchOutcome {
                        exit_code,
                        error: if output.status.success() {
                            None
                        } else {
                            Some(format!("process exited with code {exit_code}"))
                        },
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    }
                }
                Err(e) => {
                    warn!(command = %script, error = %e, "failed to spawn shell step");
                    DispatchOutcome::failed(-1, e.to_string())
                }
            };

            if last.error.is_some() {
                return Ok(last);
            }
        }

        Ok(last)
    }

    async fn execute_builtin(
        &self,
        name: Option<&str>,
        param_values: &[String],
    ) -> DomainResult<DispatchOutcome> {
        let name = name.ok_or_else(|| DomainError::InvalidInput("BUILTIN step has no name".into()))?;
        let implementation = self
            .builtins
            .get(name)
            .ok_or_else(|| DomainError::InvalidInput(format!("no built-in registered as '{name}'")))?;

        match implementation.execute(param_values).await {
            Ok(exit_code) if exit_code == 0 => Ok(DispatchOutcome::ok()),
            Ok(exit_code) => Ok(DispatchOutcome::failed(exit_code, format!("built-in '{name}' returned {exit_code}"))),
            Err(e) => Ok(DispatchOutcome::failed(-1, e.to_string())),
        }
    }
}

fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
        serde_json::Value::Number(n) => query.bind(n.as_f64()),
        serde_json::Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::ports::BuiltinTask;
    use async_trait::async_trait;

    async fn dispatcher() -> TaskDispatcher {
        let pool = create_migrated_test_pool().await.unwrap();
        TaskDispatcher::new(pool, Arc::new(BuiltinRegistry::new()))
    }

    #[tokio::test]
    async fn shell_success_returns_zero() {
        let d = dispatcher().await;
        let outcome = d.execute(TaskKind::Shell, Some("true"), None, &[]).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn shell_nonzero_is_reported_as_error() {
        let d = dispatcher().await;
        let outcome = d.execute(TaskKind::Shell, Some("false"), None, &[]).await.unwrap();
        assert_ne!(outcome.exit_code, 0);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn shell_reports_the_exit_code_carried_in_its_parameter_set() {
        // spec.md §8 scenario S2: script "sh", params `["[\"-c\",\"exit 3\"]"]`.
        let d = dispatcher().await;
        let params = vec![r#"["-c","exit 3"]"#.to_string()];
        let outcome = d.execute(TaskKind::Shell, Some("sh"), None, &params).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn shell_empty_command_is_rejected() {
        let d = dispatcher().await;
        let result = d.execute(TaskKind::Shell, Some(""), None, &[]).await;
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn shell_whitespace_only_command_is_rejected_without_spawning() {
        // spec.md §8 scenario S4: a whitespace-only script is rejected
        // the same way an empty one is, without ever spawning a process.
        let d = dispatcher().await;
        let result = d.execute(TaskKind::Shell, Some("   "), None, &[]).await;
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn builtin_missing_name_is_invalid_input() {
        let d = dispatcher().await;
        let result = d.execute(TaskKind::Builtin, Some("not_registered"), None, &[]).await;
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    struct AlwaysOk;

    #[async_trait]
    impl BuiltinTask for AlwaysOk {
        async fn execute(&self, _param_values: &[String]) -> DomainResult<i32> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn builtin_registered_runs_through_registry() {
        let pool = create_migrated_test_pool().await.unwrap();
        let mut registry = BuiltinRegistry::new();
        registry.register("noop", Arc::new(AlwaysOk));
        let d = TaskDispatcher::new(pool, Arc::new(registry));

        let outcome = d.execute(TaskKind::Builtin, Some("noop"), None, &[]).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
    }
}
