//! Scheduler loops under paused tokio time

mod common;

use chrono::Utc;
use common::{open_store, repository, FakeDogApi};
use dogquiz_core::{
    BreedRecord, CacheEvent, CacheManager, CacheScheduler, Constraints, ManualConditions,
    TaskKind, TaskOutcome, TaskSchedule,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const INTERVAL: Duration = Duration::from_secs(60);

fn manager(api: FakeDogApi) -> (TempDir, Arc<CacheManager>) {
    let (dir, store) = open_store();
    let repo = repository(store, Arc::new(api));
    (dir, Arc::new(CacheManager::new(Arc::new(repo))))
}

fn schedule(kind: TaskKind, constraints: Constraints) -> Vec<TaskSchedule> {
    vec![TaskSchedule {
        kind,
        interval: INTERVAL,
        constraints,
    }]
}

fn insert_expired(manager: &CacheManager, key: &str) {
    let mut record = BreedRecord::new(key, None, key, Utc::now(), chrono::Duration::days(7));
    record.expires_at = record.cached_at - chrono::Duration::minutes(1);
    manager.repository().store().upsert_breed(&record).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_task_runs_after_one_interval() {
    let (_dir, manager) = manager(FakeDogApi::with_generated(3));
    insert_expired(&manager, "pug");
    let mut events = manager.events().subscribe();

    let scheduler = CacheScheduler::new(Arc::clone(&manager), Arc::new(ManualConditions::default()))
        .with_schedules(schedule(TaskKind::Cleanup, Constraints::default()));
    let handle = scheduler.start();

    tokio::time::sleep(INTERVAL / 2).await;
    assert!(scheduler.last_report(TaskKind::Cleanup).is_none());

    tokio::time::sleep(INTERVAL).await;
    let report = scheduler.last_report(TaskKind::Cleanup).unwrap();
    assert_eq!(report.outcome, TaskOutcome::Success);
    assert_eq!(report.breeds_removed, 1);

    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        if let CacheEvent::TaskFinished { kind, success } = event {
            assert_eq!(kind, TaskKind::Cleanup);
            assert!(success);
            finished = true;
        }
    }
    assert!(finished);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_low_battery_skips_task() {
    let (_dir, manager) = manager(FakeDogApi::with_generated(3));
    let conditions = Arc::new(ManualConditions::default());
    conditions.set_battery_acceptable(false);

    let scheduler = CacheScheduler::new(Arc::clone(&manager), conditions.clone()).with_schedules(
        schedule(
            TaskKind::Cleanup,
            Constraints {
                requires_battery_not_low: true,
                ..Default::default()
            },
        ),
    );
    let handle = scheduler.start();

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    let report = scheduler.last_report(TaskKind::Cleanup).unwrap();
    assert_eq!(
        report.outcome,
        TaskOutcome::Skipped {
            reason: "battery low".to_string()
        }
    );

    conditions.set_battery_acceptable(true);
    tokio::time::sleep(INTERVAL).await;
    assert!(scheduler.last_report(TaskKind::Cleanup).unwrap().is_success());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_is_reported() {
    let api = FakeDogApi::with_generated(3);
    api.set_failing(true);
    let (_dir, manager) = manager(api);
    insert_expired(&manager, "pug");

    let scheduler = CacheScheduler::new(Arc::clone(&manager), Arc::new(ManualConditions::default()))
        .with_schedules(schedule(TaskKind::Refresh, Constraints::default()));
    let handle = scheduler.start();

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    let report = scheduler.last_report(TaskKind::Refresh).unwrap();
    assert!(matches!(report.outcome, TaskOutcome::Failed { .. }));

    // the loop keeps going after a failure
    tokio::time::sleep(INTERVAL).await;
    let again = scheduler.last_report(TaskKind::Refresh).unwrap();
    assert!(again.started_at >= report.started_at);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_loops() {
    let (_dir, manager) = manager(FakeDogApi::with_generated(3));
    let scheduler = CacheScheduler::new(Arc::clone(&manager), Arc::new(ManualConditions::default()))
        .with_schedules(schedule(TaskKind::Optimize, Constraints::default()));

    let handle = scheduler.start();
    handle.shutdown().await;

    tokio::time::sleep(INTERVAL * 3).await;
    assert!(scheduler.last_report(TaskKind::Optimize).is_none());
}

#[tokio::test]
async fn test_run_now_ignores_constraints() {
    let (_dir, manager) = manager(FakeDogApi::with_generated(3));
    let conditions = Arc::new(ManualConditions::default());
    conditions.set_idle(false);
    conditions.set_network_available(false);

    let scheduler = CacheScheduler::new(Arc::clone(&manager), conditions);
    let report = scheduler.run_now(TaskKind::Optimize).await;

    assert!(report.is_success());
    assert!(scheduler.last_report(TaskKind::Optimize).is_some());
}
