//! Infrastructure layer: configuration loading and process logging.
//! The database connection itself lives under `adapters::sqlite`.

pub mod config;
pub mod logging;
