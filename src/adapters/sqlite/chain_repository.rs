//! SQLite adapter for [`ChainRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BaseTask, ChainElementExecution, ChainExecutionConfig, ChainExecutionParameters,
    DatabaseConnection, EligibleConfig, ExecutionLogEntry, ExecutionStatus, LogLevel, RunAt,
    RunStatus, TaskChain, TaskKind, MAX_CHAIN_HOPS,
};
use crate::domain::ports::chain_repository::{ChainRepository, ChainTx};

#[derive(Clone)]
pub struct SqliteChainRepository {
    pool: SqlitePool,
}

impl SqliteChainRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn uuid_opt(u: Option<Uuid>) -> Option<String> {
    u.map(|u| u.to_string())
}

#[async_trait]
impl ChainRepository for SqliteChainRepository {
    async fn start_transaction(&self) -> DomainResult<ChainTx> {
        self.pool.begin().await.map_err(DomainError::from)
    }

    async fn commit_transaction(&self, tx: ChainTx) -> DomainResult<()> {
        tx.commit().await.map_err(DomainError::from)
    }

    async fn select_eligible_configs(
        &self,
        _now: DateTime<Utc>,
        client_name: Option<&str>,
    ) -> DomainResult<Vec<EligibleConfig>> {
        let rows = sqlx::query(
            "SELECT id, chain_id, chain_name, run_at_data, max_instances, live,
                    self_destruct, exclusive_execution, excluded_execution_configs, client_name
             FROM chain_execution_configs
             WHERE live = 1 AND (client_name IS NULL OR client_name = ?1)",
        )
        .bind(client_name)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let config = row_to_config(&row)?;
            let last_completed_at = self.last_completed_at(config.id).await?;
            out.push(EligibleConfig { config, last_completed_at });
        }
        Ok(out)
    }

    async fn load_chain_elements(
        &self,
        head_chain_id: Uuid,
    ) -> DomainResult<Vec<ChainElementExecution>> {
        let mut elements = Vec::new();
        let mut current = Some(head_chain_id);
        let mut hops = 0usize;

        while let Some(chain_id) = current {
            if hops > MAX_CHAIN_HOPS {
                return Err(DomainError::ValidationFailed(format!(
                    "chain {head_chain_id} exceeds {MAX_CHAIN_HOPS} hops, likely a cycle"
                )));
            }
            hops += 1;

            let row = sqlx::query(
                "SELECT tc.chain_id, tc.task_id, tc.database_connection, tc.ignore_error,
                        bt.name, bt.kind, bt.script
                 FROM task_chains tc
                 JOIN base_tasks bt ON bt.id = tc.task_id
                 WHERE tc.chain_id = ?1",
            )
            .bind(chain_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else { break };

            let kind: String = row.try_get("kind")?;
            elements.push(ChainElementExecution {
                chain_id,
                task_id: parse_uuid(&row.try_get::<String, _>("task_id")?)?,
                task_name: row.try_get("name")?,
                kind: TaskKind::from_str(&kind)
                    .ok_or_else(|| DomainError::SerializationError(format!("unknown task kind {kind}")))?,
                script: row.try_get("script")?,
                database_connection: parse_optional_uuid(row.try_get("database_connection")?)?,
                ignore_error: row.try_get::<i64, _>("ignore_error")? != 0,
            });

            let next: Option<String> = sqlx::query_scalar(
                "SELECT chain_id FROM task_chains WHERE parent_id = ?1",
            )
            .bind(chain_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
            current = next.map(|s| parse_uuid(&s)).transpose()?;
        }

        Ok(elements)
    }

    async fn load_chain_params(
        &self,
        config_id: Uuid,
        chain_id: Uuid,
    ) -> DomainResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT value FROM chain_execution_parameters
             WHERE chain_execution_config = ?1 AND chain_id = ?2
             ORDER BY order_id ASC",
        )
        .bind(config_id.to_string())
        .bind(chain_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    async fn insert_chain_run_status(
        &self,
        tx: &mut ChainTx,
        config_id: Uuid,
        chain_id: Uuid,
    ) -> DomainResult<i64> {
        let now = Utc::now().to_rfc3339();
        // A STARTED row's start_status is its own run_status id; insert
        // with a placeholder then patch, since SQLite assigns the id on
        // insert.
        let id = sqlx::query(
            "INSERT INTO run_status
             (start_status, execution_status, chain_id, current_execution_element, started, last_status_update, chain_execution_config)
             VALUES (0, 'STARTED', ?1, NULL, ?2, ?2, ?3)",
        )
        .bind(chain_id.to_string())
        .bind(&now)
        .bind(config_id.to_string())
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE run_status SET start_status = ?1 WHERE run_status = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(id)
    }

    async fn update_chain_run_status(
        &self,
        tx: &mut ChainTx,
        status: ExecutionStatus,
        _run_status_id: i64,
        start_status_id: i64,
        current_execution_element: Option<Uuid>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        let element = uuid_opt(current_execution_element);

        // The thread's state is append-only: each transition is a new
        // row sharing `start_status`, not a mutation of the STARTED row.
        // `chain_id`/`started`/`chain_execution_config` are carried
        // forward from that first row.
        let base: Option<(String, String, String)> = sqlx::query_as(
            "SELECT chain_id, started, chain_execution_config
             FROM run_status WHERE run_status = ?1",
        )
        .bind(start_status_id)
        .fetch_optional(&mut **tx)
        .await?;
        let Some((chain_id, started, config_id)) = base else {
            return Err(DomainError::RunStatusNotFound(start_status_id));
        };

        sqlx::query(
            "INSERT INTO run_status
             (start_status, execution_status, chain_id, current_execution_element, started, last_status_update, chain_execution_config)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(start_status_id)
        .bind(status.as_str())
        .bind(&chain_id)
        .bind(&element)
        .bind(&started)
        .bind(&now)
        .bind(&config_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_execution_log(
        &self,
        tx: &mut ChainTx,
        entry: &ExecutionLogEntry,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO execution_log
             (chain_id, task_id, name, script, kind, last_run, finished, returncode, pid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(entry.chain_id.to_string())
        .bind(entry.task_id.to_string())
        .bind(&entry.name)
        .bind(&entry.script)
        .bind(&entry.kind)
        .bind(entry.last_run.to_rfc3339())
        .bind(entry.finished.to_rfc3339())
        .bind(entry.returncode)
        .bind(entry.pid)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn delete_chain_config(&self, config_id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM chain_execution_configs WHERE id = ?1")
            .bind(config_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn log_to_db(&self, level: LogLevel, message: &str) -> DomainResult<()> {
        sqlx::query("INSERT INTO log (level, message, logged_at) VALUES (?1, ?2, ?3)")
            .bind(level.as_str())
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn can_proceed_chain_execution(
        &self,
        config_id: Uuid,
        max_instances: Option<u32>,
    ) -> DomainResult<bool> {
        // max_instances = None or 0 means unbounded (Open Question
        // resolved in DESIGN.md).
        let Some(limit) = max_instances.filter(|m| *m > 0) else {
            return Ok(true);
        };

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM run_status rs
             WHERE rs.chain_execution_config = ?1
               AND rs.run_status = (
                   SELECT MAX(r2.run_status) FROM run_status r2
                   WHERE r2.start_status = rs.start_status
               )
               AND rs.execution_status = 'STARTED'",
        )
        .bind(config_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok((active as u32) < limit)
    }

    async fn list_active_run_config_ids(&self) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT rs.chain_execution_config FROM run_status rs
             WHERE rs.run_status = (
                 SELECT MAX(r2.run_status) FROM run_status r2
                 WHERE r2.start_status = rs.start_status
             )
             AND rs.execution_status = 'STARTED'",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }

    async fn fix_scheduler_crash(&self) -> DomainResult<u64> {
        let threads: Vec<(i64, String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT rs.start_status, rs.chain_id, rs.execution_status,
                    rs.current_execution_element, rs.chain_execution_config
             FROM run_status rs
             WHERE rs.run_status = (
                 SELECT MAX(r2.run_status) FROM run_status r2
                 WHERE r2.start_status = rs.start_status
             )
             AND rs.execution_status = 'STARTED'",
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now().to_rfc3339();
        let mut fixed = 0u64;
        for (start_status, chain_id, _status, element, config_id) in threads {
            sqlx::query(
                "INSERT INTO run_status
                 (start_status, execution_status, chain_id, current_execution_element, started, last_status_update, chain_execution_config)
                 SELECT ?1, 'DEAD', ?2, ?3, started, ?4, ?5
                 FROM run_status WHERE run_status = ?1",
            )
            .bind(start_status)
            .bind(&chain_id)
            .bind(&element)
            .bind(&now)
            .bind(&config_id)
            .execute(&self.pool)
            .await?;
            fixed += 1;
        }
        Ok(fixed)
    }

    async fn count_builtin_base_tasks(&self) -> DomainResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM base_tasks WHERE kind = 'BUILTIN'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn insert_database_connection(&self, conn: &DatabaseConnection) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO database_connections (id, name, connect_string, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(conn.id.to_string())
        .bind(&conn.name)
        .bind(&conn.connect_string)
        .bind(conn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_database_connection(&self, id: Uuid) -> DomainResult<Option<DatabaseConnection>> {
        let row = sqlx::query(
            "SELECT id, name, connect_string, created_at FROM database_connections WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(DatabaseConnection {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            name: row.try_get("name")?,
            connect_string: row.try_get("connect_string")?,
            created_at: parse_datetime(&row.try_get::<String, _>("created_at")?)?,
        }))
    }

    async fn insert_base_task(&self, task: &BaseTask) -> DomainResult<()> {
        sqlx::query("INSERT INTO base_tasks (id, name, kind, script) VALUES (?1, ?2, ?3, ?4)")
            .bind(task.id.to_string())
            .bind(&task.name)
            .bind(task.kind.as_str())
            .bind(&task.script)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_base_task(&self, task_id: Uuid) -> DomainResult<Option<BaseTask>> {
        let row = sqlx::query("SELECT id, name, kind, script FROM base_tasks WHERE id = ?1")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let kind: String = row.try_get("kind")?;
        Ok(Some(BaseTask {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            name: row.try_get("name")?,
            kind: TaskKind::from_str(&kind)
                .ok_or_else(|| DomainError::SerializationError(format!("unknown task kind {kind}")))?,
            script: row.try_get("script")?,
        }))
    }

    async fn delete_base_task(&self, task_id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let chain_ids: Vec<(String,)> =
            sqlx::query_as("SELECT chain_id FROM task_chains WHERE task_id = ?1")
                .bind(task_id.to_string())
                .fetch_all(&mut *tx)
                .await?;

        for (chain_id,) in chain_ids {
            let parent_id: Option<String> =
                sqlx::query_scalar("SELECT parent_id FROM task_chains WHERE chain_id = ?1")
                    .bind(&chain_id)
                    .fetch_one(&mut *tx)
                    .await?;
            let successor: Option<String> =
                sqlx::query_scalar("SELECT chain_id FROM task_chains WHERE parent_id = ?1")
                    .bind(&chain_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .flatten();

            if let Some(successor_id) = successor {
                sqlx::query("UPDATE task_chains SET parent_id = ?1 WHERE chain_id = ?2")
                    .bind(&parent_id)
                    .bind(&successor_id)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query("DELETE FROM task_chains WHERE chain_id = ?1")
                .bind(&chain_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM base_tasks WHERE id = ?1")
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_task_chain(&self, node: &TaskChain) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO task_chains (chain_id, parent_id, task_id, run_uid, database_connection, ignore_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(node.chain_id.to_string())
        .bind(uuid_opt(node.parent_id))
        .bind(node.task_id.to_string())
        .bind(&node.run_uid)
        .bind(uuid_opt(node.database_connection))
        .bind(node.ignore_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_chain_execution_config(
        &self,
        config: &ChainExecutionConfig,
    ) -> DomainResult<()> {
        let run_at_data = serde_json::to_string(&config.run_at)?;
        let excluded: Vec<String> = config
            .excluded_execution_configs
            .iter()
            .map(|u| u.to_string())
            .collect();
        let excluded_json = serde_json::to_string(&excluded)?;

        sqlx::query(
            "INSERT INTO chain_execution_configs
             (id, chain_id, chain_name, run_at_data, max_instances, live, self_destruct,
              exclusive_execution, excluded_execution_configs, client_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(config.id.to_string())
        .bind(config.chain_id.to_string())
        .bind(&config.chain_name)
        .bind(&run_at_data)
        .bind(config.max_instances.map(|v| v as i64))
        .bind(config.live)
        .bind(config.self_destruct)
        .bind(config.exclusive_execution)
        .bind(&excluded_json)
        .bind(&config.client_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_chain_execution_parameters(
        &self,
        params: &ChainExecutionParameters,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO chain_execution_parameters (chain_execution_config, chain_id, order_id, value)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(params.chain_execution_config.to_string())
        .bind(params.chain_id.to_string())
        .bind(params.order_id)
        .bind(params.value_json())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chain_execution_config(
        &self,
        config_id: Uuid,
    ) -> DomainResult<Option<ChainExecutionConfig>> {
        let row = sqlx::query(
            "SELECT id, chain_id, chain_name, run_at_data, max_instances, live,
                    self_destruct, exclusive_execution, excluded_execution_configs, client_name
             FROM chain_execution_configs WHERE id = ?1",
        )
        .bind(config_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_config(&r)).transpose()
    }

    async fn list_chain_execution_configs(&self) -> DomainResult<Vec<ChainExecutionConfig>> {
        let rows = sqlx::query(
            "SELECT id, chain_id, chain_name, run_at_data, max_instances, live,
                    self_destruct, exclusive_execution, excluded_execution_configs, client_name
             FROM chain_execution_configs ORDER BY chain_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_config).collect()
    }

    async fn latest_run_status_for_config(
        &self,
        config_id: Uuid,
    ) -> DomainResult<Option<RunStatus>> {
        let row = sqlx::query(
            "SELECT run_status, start_status, execution_status, chain_id,
                    current_execution_element, started, last_status_update, chain_execution_config
             FROM run_status
             WHERE chain_execution_config = ?1
             ORDER BY run_status DESC
             LIMIT 1",
        )
        .bind(config_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };

        let status: String = row.try_get("execution_status")?;
        Ok(Some(RunStatus {
            run_status: row.try_get("run_status")?,
            start_status: row.try_get("start_status")?,
            execution_status: ExecutionStatus::from_str(&status).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown execution status {status}"))
            })?,
            chain_id: parse_uuid(&row.try_get::<String, _>("chain_id")?)?,
            current_execution_element: parse_optional_uuid(row.try_get("current_execution_element")?)?,
            started: parse_datetime(&row.try_get::<String, _>("started")?)?,
            last_status_update: parse_datetime(&row.try_get::<String, _>("last_status_update")?)?,
            chain_execution_config: parse_uuid(&row.try_get::<String, _>("chain_execution_config")?)?,
        }))
    }
}

impl SqliteChainRepository {
    async fn last_completed_at(&self, config_id: Uuid) -> DomainResult<Option<DateTime<Utc>>> {
        let ts: Option<String> = sqlx::query_scalar(
            "SELECT MAX(last_status_update) FROM run_status
             WHERE chain_execution_config = ?1 AND execution_status = 'CHAIN_DONE'",
        )
        .bind(config_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        parse_optional_datetime(ts)
    }
}

fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> DomainResult<ChainExecutionConfig> {
    let run_at_data: String = row.try_get("run_at_data")?;
    let run_at: RunAt = serde_json::from_str(&run_at_data)?;
    let excluded_json: String = row.try_get("excluded_execution_configs")?;
    let excluded_strings: Vec<String> = serde_json::from_str(&excluded_json)?;
    let excluded_execution_configs = excluded_strings
        .into_iter()
        .map(|s| parse_uuid(&s))
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(ChainExecutionConfig {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        chain_id: parse_uuid(&row.try_get::<String, _>("chain_id")?)?,
        chain_name: row.try_get("chain_name")?,
        run_at,
        max_instances: row.try_get::<Option<i64>, _>("max_instances")?.map(|v| v as u32),
        live: row.try_get::<i64, _>("live")? != 0,
        self_destruct: row.try_get::<i64, _>("self_destruct")? != 0,
        exclusive_execution: row.try_get::<i64, _>("exclusive_execution")? != 0,
        excluded_execution_configs,
        client_name: row.try_get("client_name")?,
    })
}
