//! Scheduler loop (spec.md §4.5): the single cooperative tick loop that
//! drives chain runs. Modeled on the teacher's `EventScheduler` tick
//! loop — an `AtomicBool` running flag, `start()`/`stop()`, a
//! `tokio::spawn`ed task owning its own clones of shared state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::application::admission::AdmissionController;
use crate::application::chain_runner::ChainRunner;
use crate::application::dispatcher::TaskDispatcher;
use crate::domain::ports::ChainRepository;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    pub max_concurrent_runners: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval_ms: 60_000, max_concurrent_runners: 50 }
    }
}

pub struct SchedulerLoop {
    repo: Arc<dyn ChainRepository>,
    admission: Arc<AdmissionController>,
    dispatcher: TaskDispatcher,
    config: SchedulerConfig,
    client_name: Option<String>,
    running: Arc<AtomicBool>,
    process_started_at: chrono::DateTime<Utc>,
    /// Config ids whose one-shot (`@after`/`@reboot`) schedule has
    /// already fired this process lifetime.
    fired_once: Arc<RwLock<HashSet<uuid::Uuid>>>,
    active_runners: Arc<tokio::sync::Semaphore>,
}

impl SchedulerLoop {
    pub fn new(
        repo: Arc<dyn ChainRepository>,
        dispatcher: TaskDispatcher,
        config: SchedulerConfig,
        client_name: Option<String>,
    ) -> Self {
        let admission = Arc::new(AdmissionController::new(repo.clone()));
        let max_concurrent = config.max_concurrent_runners as usize;
        Self {
            repo,
            admission,
            dispatcher,
            config,
            client_name,
            running: Arc::new(AtomicBool::new(false)),
            process_started_at: Utc::now(),
            fired_once: Arc::new(RwLock::new(HashSet::new())),
            active_runners: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Spawn the tick loop. Runs until `stop()` is called.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let repo = self.repo.clone();
        let admission = self.admission.clone();
        let dispatcher = self.dispatcher.clone();
        let running = self.running.clone();
        let client_name = self.client_name.clone();
        let process_started_at = self.process_started_at;
        let fired_once = self.fired_once.clone();
        let active_runners = self.active_runners.clone();
        let tick_interval = Duration::from_millis(self.config.tick_interval_ms);

        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                if let Err(e) = tick(
                    &repo,
                    &admission,
                    &dispatcher,
                    client_name.as_deref(),
                    process_started_at,
                    &fired_once,
                    &active_runners,
                )
                .await
                {
                    error!(error = %e, "scheduler tick failed");
                }
                tokio::time::sleep(tick_interval).await;
            }
        })
    }
}

#[instrument(skip_all)]
async fn tick(
    repo: &Arc<dyn ChainRepository>,
    admission: &Arc<AdmissionController>,
    dispatcher: &TaskDispatcher,
    client_name: Option<&str>,
    process_started_at: chrono::DateTime<Utc>,
    fired_once: &Arc<RwLock<HashSet<uuid::Uuid>>>,
    active_runners: &Arc<tokio::sync::Semaphore>,
) -> Result<(), crate::domain::errors::DomainError> {
    let now = Utc::now();
    let eligible = repo.select_eligible_configs(now, client_name).await?;

    for candidate in eligible {
        let config = candidate.config;

        let already_fired = fired_once.read().await.contains(&config.id);
        let next_fire = config
            .run_at
            .next_fire_after(now, process_started_at, candidate.last_completed_at, already_fired);

        let Some(next_fire) = next_fire else { continue };
        if next_fire > now {
            continue;
        }

        if !admission.can_proceed(&config, client_name).await? {
            continue;
        }

        let Ok(permit) = Arc::clone(active_runners).try_acquire_owned() else {
            warn!(config_id = %config.id, "max_concurrent_runners reached, skipping this tick");
            continue;
        };

        // Mark one-shot schedules fired only once a runner is actually
        // going to spawn — a permit loss must not burn the one and only
        // chance `@after`/`@reboot` ever gets.
        if config.run_at.is_one_shot() {
            fired_once.write().await.insert(config.id);
        }

        let runner = ChainRunner::new(repo.clone(), dispatcher.clone());
        let config_id = config.id;
        tokio::spawn(async move {
            let _permit = permit;
            let cancel = Arc::new(AtomicBool::new(false));
            match runner.run(&config, cancel).await {
                Ok(status) => info!(config_id = %config_id, ?status, "chain run finished"),
                Err(e) => error!(config_id = %config_id, error = %e, "chain run failed"),
            }
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteChainRepository};
    use crate::application::admission::AdmissionController;
    use crate::application::dispatcher::TaskDispatcher;
    use crate::domain::models::{BaseTask, ChainExecutionConfig, RunAt, TaskChain, TaskKind};
    use crate::domain::ports::BuiltinRegistry;

    #[tokio::test]
    async fn a_one_shot_config_that_loses_the_concurrency_race_is_not_marked_fired() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool.clone()));
        let admission = Arc::new(AdmissionController::new(repo.clone()));
        let dispatcher = TaskDispatcher::new(pool, Arc::new(BuiltinRegistry::new()));

        let task = BaseTask::new("noop", TaskKind::Builtin, None);
        repo.insert_base_task(&task).await.unwrap();
        let node = TaskChain::new(task.id);
        repo.insert_task_chain(&node).await.unwrap();
        let config = ChainExecutionConfig::new(node.chain_id, "reboot-once", RunAt::Reboot);
        repo.insert_chain_execution_config(&config).await.unwrap();

        let fired_once = Arc::new(RwLock::new(HashSet::new()));
        let process_started_at = Utc::now();

        // No permits available: the run can't be spawned this tick.
        let exhausted = Arc::new(tokio::sync::Semaphore::new(0));
        tick(&repo, &admission, &dispatcher, None, process_started_at, &fired_once, &exhausted)
            .await
            .unwrap();
        assert!(
            !fired_once.read().await.contains(&config.id),
            "a one-shot schedule must not be burned when it never got to run"
        );

        // A permit frees up: the same one-shot config must still be
        // eligible and should now fire and be recorded.
        let available = Arc::new(tokio::sync::Semaphore::new(1));
        tick(&repo, &admission, &dispatcher, None, process_started_at, &fired_once, &available)
            .await
            .unwrap();
        assert!(fired_once.read().await.contains(&config.id));
    }
}
