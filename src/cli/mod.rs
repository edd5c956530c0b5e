//! Process surface (spec.md §6): a `clap`-derived CLI wrapping the
//! scheduler daemon and a handful of read-only inspection commands.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands, RunStatusCommands, SchedulerCommands, TaskCommands};
