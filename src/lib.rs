//! A database-backed scheduler that executes ordered chains of
//! heterogeneous tasks (SQL / SHELL / BUILTIN) against a relational
//! store, admitting chain runs under concurrency and exclusion rules
//! and recording lifecycle status back into the same database.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub use domain::errors::{DomainError, DomainResult};
