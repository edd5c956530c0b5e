//! Process-level logging setup.
//!
//! This is operator-facing output (stderr, `pretty` or `json`). It is
//! distinct from the `log` table written via `ChainRepository::log_to_db`,
//! which is the durable, DB-resident audit surface the scheduler itself
//! reads back (spec.md §3/§6).

use tracing_subscriber::{fmt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

/// Initialize the global `tracing` subscriber from `config`. Call once,
/// at process start, before anything else logs.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
