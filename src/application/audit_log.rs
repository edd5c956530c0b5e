//! The DB-backed `log` table writer (spec.md §6, §8 invariants 2-3):
//! a thin policy layer over `ChainRepository::log_to_db` that applies
//! the verbosity filter and the PANIC-terminates-the-process rule.

use std::sync::Arc;

use tracing::error;

use crate::domain::errors::DomainResult;
use crate::domain::models::LogLevel;
use crate::domain::ports::ChainRepository;

/// Writes to the `log` table, honoring the verbosity filter and PANIC
/// semantics. Distinct from `tracing` (operator-facing stderr/JSON);
/// this is the durable, DB-resident audit surface the scheduler reads
/// back, per [`crate::infrastructure::logging`].
pub struct AuditLog {
    repo: Arc<dyn ChainRepository>,
    verbose: bool,
}

impl AuditLog {
    pub fn new(repo: Arc<dyn ChainRepository>, verbose: bool) -> Self {
        Self { repo, verbose }
    }

    /// Write one `log` row, unless `level` is suppressed by the
    /// verbosity filter. A `PANIC` level is always written, then
    /// terminates the process with a non-zero exit code.
    pub async fn log(&self, level: LogLevel, message: &str) -> DomainResult<()> {
        if level.is_suppressed_unless_verbose() && !self.verbose {
            return Ok(());
        }

        self.repo.log_to_db(level, message).await?;

        if level == LogLevel::Panic {
            error!(message, "PANIC log level recorded, terminating process");
            std::process::exit(1);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteChainRepository};
    use sqlx::SqlitePool;

    async fn setup() -> (Arc<dyn ChainRepository>, SqlitePool) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool.clone()));
        (repo, pool)
    }

    async fn log_row_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM log")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn suppresses_debug_notice_log_when_not_verbose() {
        let (repo, pool) = setup().await;
        let audit = AuditLog::new(repo, false);

        audit.log(LogLevel::Debug, "debug line").await.unwrap();
        audit.log(LogLevel::Notice, "notice line").await.unwrap();
        audit.log(LogLevel::Log, "log line").await.unwrap();

        assert_eq!(log_row_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn records_error_and_user_regardless_of_verbosity() {
        let (repo, pool) = setup().await;
        let audit = AuditLog::new(repo, false);

        audit.log(LogLevel::Error, "err").await.unwrap();
        audit.log(LogLevel::User, "user-facing").await.unwrap();

        assert_eq!(log_row_count(&pool).await, 2);
    }

    #[tokio::test]
    async fn verbose_mode_records_all_levels() {
        let (repo, pool) = setup().await;
        let audit = AuditLog::new(repo, true);

        audit.log(LogLevel::Debug, "debug line").await.unwrap();
        audit.log(LogLevel::Notice, "notice line").await.unwrap();
        audit.log(LogLevel::Log, "log line").await.unwrap();

        assert_eq!(log_row_count(&pool).await, 3);
    }
}
