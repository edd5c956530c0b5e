//! Domain errors for the chain scheduler.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while configuring or running chains.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("base task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("chain execution config not found: {0}")]
    ConfigNotFound(Uuid),

    #[error("run status thread not found: {0}")]
    RunStatusNotFound(i64),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A step's shell command was empty, or a JSON parameter array was
    /// malformed, or a built-in name has no registered implementation.
    /// Per spec.md §7, callers treat this identically to `StepFailure`
    /// with exit code -1.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A step dispatched via SQL, SHELL, or BUILTIN returned a non-zero
    /// exit code or a driver/spawn error.
    #[error("step failed: {0}")]
    StepFailure(String),

    /// Missing schema/migration files or an unreachable configuration
    /// database at startup. Callers should PANIC-log and exit.
    #[error("fatal startup error: {0}")]
    FatalStartup(String),

    /// A chain run was cancelled cooperatively between step boundaries.
    #[error("run cancelled")]
    Cancelled,
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// True for errors the spec treats as a recoverable step failure
    /// (exit code -1, `ignore_error` still applies) rather than a
    /// process-fatal condition.
    pub const fn is_step_level(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::StepFailure(_) | Self::DatabaseError(_)
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
