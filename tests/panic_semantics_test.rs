//! spec.md §8 invariant 3: a `PANIC` log call terminates the process.
//! Verified out-of-process, since the in-process assertion would kill
//! the test harness itself.

use std::process::Command;

const GUARD_ENV: &str = "ABATHUR_TIMETABLE_PANIC_LOG_SUBPROCESS";

#[test]
fn panic_log_terminates_the_process() {
    if std::env::var(GUARD_ENV).is_ok() {
        // Re-entered as the child: perform the PANIC log and let the
        // process exit non-zero before control returns to this test.
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            use std::sync::Arc;

            use abathur_timetable::adapters::sqlite::{create_migrated_test_pool, SqliteChainRepository};
            use abathur_timetable::application::AuditLog;
            use abathur_timetable::domain::models::LogLevel;
            use abathur_timetable::domain::ports::ChainRepository;

            let pool = create_migrated_test_pool().await.unwrap();
            let repo: Arc<dyn ChainRepository> = Arc::new(SqliteChainRepository::new(pool));
            let audit = AuditLog::new(repo, false);
            audit.log(LogLevel::Panic, "subprocess panic probe").await.unwrap();
        });
        unreachable!("AuditLog::log should have exited the process on PANIC");
    }

    let exe = std::env::current_exe().expect("test binary path");
    let status = Command::new(exe)
        .arg("--exact")
        .arg("panic_log_terminates_the_process")
        .env(GUARD_ENV, "1")
        .status()
        .expect("failed to spawn subprocess");

    assert!(!status.success(), "PANIC-level log should have terminated the process");
}
