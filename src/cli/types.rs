//! CLI type definitions — the clap command tree for the scheduler process.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "abathur-timetable")]
#[command(about = "A database-backed scheduler for linear SQL/SHELL/BUILTIN task chains", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scheduler process commands
    #[command(subcommand)]
    Scheduler(SchedulerCommands),

    /// Base task inspection commands
    #[command(subcommand)]
    Task(TaskCommands),

    /// Run-status inspection commands
    #[command(subcommand)]
    RunStatus(RunStatusCommands),
}

#[derive(Subcommand)]
pub enum SchedulerCommands {
    /// Run the scheduler: recover crashed run-status threads, then tick
    /// until SIGINT/SIGTERM.
    Run,

    /// Run crash recovery once and exit, without starting the tick loop.
    Recover,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List registered base tasks.
    List,
}

#[derive(Subcommand)]
pub enum RunStatusCommands {
    /// Show the run-status thread started by the given `chain_execution_config` name.
    Show {
        /// `chain_name` of the config whose latest run thread to show.
        chain_name: String,
    },
}
