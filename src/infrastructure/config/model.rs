//! Configuration structure for the timetable scheduler process.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// This agent's client tag, matched against `chain_execution_configs.client_name`.
    #[serde(default)]
    pub client_name: Option<String>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_name: None,
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Location and pool sizing of the configuration database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `sqlite::memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".timetable/timetable.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Scheduler loop tick cadence and concurrency bound (spec.md §4.5, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Soft cap on concurrently spawned chain runners; admission control
    /// (`max_instances`/`exclusive_execution`) is the per-config limit,
    /// this is the process-wide ceiling.
    #[serde(default = "default_max_concurrent_runners")]
    pub max_concurrent_runners: u32,
}

const fn default_tick_interval_ms() -> u64 {
    60_000
}

const fn default_max_concurrent_runners() -> u32 {
    50
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrent_runners: default_max_concurrent_runners(),
        }
    }
}

/// Operator-facing `tracing` output, independent of the DB-backed `log` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    /// Minimum `log` table level recorded when not running verbose
    /// (spec.md §6): DEBUG/NOTICE/LOG are suppressed unless verbose.
    #[serde(default)]
    pub verbose: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            verbose: false,
        }
    }
}
