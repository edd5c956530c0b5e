//! Domain ports (interfaces) for the chain scheduler.

pub mod builtin_registry;
pub mod chain_repository;

pub use builtin_registry::{BuiltinRegistry, BuiltinTask};
pub use chain_repository::{ChainRepository, ChainTx};
