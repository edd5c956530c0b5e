//! abathur-timetable CLI entry point

use std::sync::Arc;

use abathur_timetable::adapters::sqlite::{initialize_database, SqliteChainRepository};
use abathur_timetable::application::{SchedulerConfig, TaskDispatcher};
use abathur_timetable::cli::commands::{
    default_builtin_registry, handle_run_status_show, handle_scheduler_recover,
    handle_scheduler_run, handle_task_list,
};
use abathur_timetable::cli::{Cli, Commands, RunStatusCommands, SchedulerCommands, TaskCommands};
use abathur_timetable::domain::ports::ChainRepository;
use abathur_timetable::infrastructure::config::ConfigLoader;
use abathur_timetable::infrastructure::logging;
use anyhow::{Context, Result};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("failed to load configuration")?;
    logging::init(&config.logging);

    let database_url = format!("sqlite:{}", config.database.path);
    let pool = initialize_database(&database_url)
        .await
        .context("failed to initialize configuration database")?;

    let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool.clone()));
    let dispatcher = TaskDispatcher::new(pool, default_builtin_registry());

    match cli.command {
        Commands::Scheduler(SchedulerCommands::Run) => {
            let app_config = SchedulerConfig {
                tick_interval_ms: config.scheduler.tick_interval_ms,
                max_concurrent_runners: config.scheduler.max_concurrent_runners,
            };
            handle_scheduler_run(
                repo,
                dispatcher,
                app_config,
                config.client_name,
                config.logging.verbose,
            )
            .await?;
        }
        Commands::Scheduler(SchedulerCommands::Recover) => {
            handle_scheduler_recover(repo, cli.json).await?;
        }
        Commands::Task(TaskCommands::List) => {
            handle_task_list(repo, cli.json).await?;
        }
        Commands::RunStatus(RunStatusCommands::Show { chain_name }) => {
            handle_run_status_show(repo, chain_name, cli.json).await?;
        }
    }

    Ok(())
}
