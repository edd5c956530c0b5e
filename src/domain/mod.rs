//! Domain layer: the chain-scheduler's core business types and ports.
//!
//! Contains the persistent entities (§3 of the data model), the error
//! type shared across the whole crate, and the repository/dispatcher
//! traits (`ports`) that the `adapters` and `application` layers
//! implement and consume, respectively.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
