//! Configuration management infrastructure.
//!
//! Hierarchical configuration using figment: YAML file loading,
//! environment variable overrides, and post-load validation.

pub mod loader;
pub mod model;

pub use loader::{ConfigError, ConfigLoader};
pub use model::{Config, DatabaseConfig, LoggingConfig, SchedulerConfig};
