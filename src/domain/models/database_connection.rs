//! Database connection registry entries.
//!
//! A `DatabaseConnection` is an opaque connect-string plus identifier.
//! Chain steps reference one when they should execute SQL against a
//! database other than the configuration database itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConnection {
    pub id: Uuid,
    /// Human-readable identifier, unique.
    pub name: String,
    /// Opaque connect string (e.g. a `sqlite:` or `postgres:` URL).
    pub connect_string: String,
    pub created_at: DateTime<Utc>,
}

impl DatabaseConnection {
    pub fn new(name: impl Into<String>, connect_string: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            connect_string: connect_string.into(),
            created_at: Utc::now(),
        }
    }
}
