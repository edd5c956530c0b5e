//! Application layer: orchestration logic that sits between the domain
//! ports and the process surface (spec.md §4).

pub mod admission;
pub mod audit_log;
pub mod chain_runner;
pub mod dispatcher;
pub mod recovery;
pub mod scheduler_loop;

pub use admission::AdmissionController;
pub use audit_log::AuditLog;
pub use chain_runner::{CancelFlag, ChainRunner};
pub use dispatcher::{DispatchOutcome, TaskDispatcher};
pub use scheduler_loop::{SchedulerConfig, SchedulerLoop};
