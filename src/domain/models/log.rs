//! Append-only leveled log domain model (the `log` table — spec.md §3/§6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Notice,
    Log,
    Error,
    Panic,
    User,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Notice => "NOTICE",
            Self::Log => "LOG",
            Self::Error => "ERROR",
            Self::Panic => "PANIC",
            Self::User => "USER",
        }
    }

    /// Suppressed levels when verbose logging is off (spec.md §6).
    /// `ERROR`, `PANIC`, and `USER` are always recorded.
    pub fn is_suppressed_unless_verbose(&self) -> bool {
        matches!(self, Self::Debug | Self::Notice | Self::Log)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}
