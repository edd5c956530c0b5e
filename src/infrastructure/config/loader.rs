use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::model::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid tick_interval_ms: {0}. Must be at least 1000")]
    InvalidTickInterval(u64),

    #[error("invalid max_concurrent_runners: {0}. Must be at least 1")]
    InvalidMaxConcurrentRunners(u32),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.timetable/config.yaml`
    /// 3. `.timetable/local.yaml` (optional overrides)
    /// 4. Environment variables (`TIMETABLE_` prefix, `__`-split for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".timetable/config.yaml"))
            .merge(Yaml::file(".timetable/local.yaml"))
            .merge(Env::prefixed("TIMETABLE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        if config.scheduler.tick_interval_ms < 1000 {
            return Err(ConfigError::InvalidTickInterval(config.scheduler.tick_interval_ms));
        }

        if config.scheduler.max_concurrent_runners == 0 {
            return Err(ConfigError::InvalidMaxConcurrentRunners(
                config.scheduler.max_concurrent_runners,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.path, ".timetable/timetable.db");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_parsing_overrides_defaults() {
        let yaml = r"
client_name: worker-a
database:
  path: /tmp/timetable.db
  max_connections: 3
scheduler:
  tick_interval_ms: 5000
  max_concurrent_runners: 10
logging:
  level: debug
  format: json
";
        let config: Config = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.client_name.as_deref(), Some("worker-a"));
        assert_eq!(config.database.path, "/tmp/timetable.db");
        assert_eq!(config.scheduler.tick_interval_ms, 5000);
        assert_eq!(config.logging.format, "json");
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn rejects_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = Config::default();
        config.scheduler.tick_interval_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTickInterval(0))
        ));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::InvalidLogLevel(ref l)) if l == "verbose"));
    }

    #[test]
    fn env_override_splits_nested_keys() {
        use figment::Jail;

        Jail::expect_with(|jail| {
            jail.set_env("TIMETABLE_DATABASE__MAX_CONNECTIONS", "2");
            jail.set_env("TIMETABLE_LOGGING__LEVEL", "debug");

            let config: Config = Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Env::prefixed("TIMETABLE_").split("__"))
                .extract()
                .unwrap();

            assert_eq!(config.database.max_connections, 2);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn hierarchical_merging_lets_override_win() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "logging:\n  level: info\n  format: json").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "logging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug", "override should win");
        assert_eq!(config.logging.format, "json", "base value should persist when not overridden");
    }
}
