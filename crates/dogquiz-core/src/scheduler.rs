//! Periodic background maintenance
//!
//! Three independent tasks (cleanup, refresh, optimize), each with an
//! interval and a declarative constraint set. How constraints are observed
//! is up to the [`DeviceConditions`] implementation; the scheduler only asks
//! before each run and records a `Skipped` report when they are not met.
//!
//! Task bodies run in their own tokio task, so a panic becomes a `Failed`
//! report instead of taking the loop down.

use crate::config::CacheConfig;
use crate::event::CacheEvent;
use crate::manager::CacheManager;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Cleanup,
    Refresh,
    Optimize,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Cleanup, TaskKind::Refresh, TaskKind::Optimize];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Cleanup => "cleanup",
            TaskKind::Refresh => "refresh",
            TaskKind::Optimize => "optimize",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device state a task needs before it may run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Constraints {
    pub requires_network: bool,
    pub requires_battery_not_low: bool,
    pub requires_idle: bool,
}

impl Constraints {
    /// First unmet constraint, `None` when the task may run
    pub fn unmet(&self, conditions: &dyn DeviceConditions) -> Option<&'static str> {
        if self.requires_battery_not_low && !conditions.is_battery_acceptable() {
            return Some("battery low");
        }
        if self.requires_network && !conditions.is_network_available() {
            return Some("network unavailable");
        }
        if self.requires_idle && !conditions.is_idle() {
            return Some("device busy");
        }
        None
    }
}

pub trait DeviceConditions: Send + Sync {
    fn is_battery_acceptable(&self) -> bool;
    fn is_network_available(&self) -> bool;
    fn is_idle(&self) -> bool;
}

/// Every constraint always satisfied
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

impl DeviceConditions for AlwaysReady {
    fn is_battery_acceptable(&self) -> bool {
        true
    }

    fn is_network_available(&self) -> bool {
        true
    }

    fn is_idle(&self) -> bool {
        true
    }
}

/// Conditions set by the host (or a test); all satisfied initially
#[derive(Debug)]
pub struct ManualConditions {
    battery_ok: AtomicBool,
    network: AtomicBool,
    idle: AtomicBool,
}

impl Default for ManualConditions {
    fn default() -> Self {
        Self {
            battery_ok: AtomicBool::new(true),
            network: AtomicBool::new(true),
            idle: AtomicBool::new(true),
        }
    }
}

impl ManualConditions {
    pub fn set_battery_acceptable(&self, ok: bool) {
        self.battery_ok.store(ok, Ordering::Relaxed);
    }

    pub fn set_network_available(&self, available: bool) {
        self.network.store(available, Ordering::Relaxed);
    }

    pub fn set_idle(&self, idle: bool) {
        self.idle.store(idle, Ordering::Relaxed);
    }
}

impl DeviceConditions for ManualConditions {
    fn is_battery_acceptable(&self) -> bool {
        self.battery_ok.load(Ordering::Relaxed)
    }

    fn is_network_available(&self) -> bool {
        self.network.load(Ordering::Relaxed)
    }

    fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSchedule {
    pub kind: TaskKind,
    pub interval: Duration,
    pub constraints: Constraints,
}

impl TaskSchedule {
    /// Cleanup every 6h (battery), refresh every 12h (network + battery),
    /// optimize every 24h (idle + battery), intervals from `config`
    pub fn defaults(config: &CacheConfig) -> Vec<TaskSchedule> {
        vec![
            TaskSchedule {
                kind: TaskKind::Cleanup,
                interval: config.cleanup_interval(),
                constraints: Constraints {
                    requires_battery_not_low: true,
                    ..Default::default()
                },
            },
            TaskSchedule {
                kind: TaskKind::Refresh,
                interval: config.refresh_interval(),
                constraints: Constraints {
                    requires_network: true,
                    requires_battery_not_low: true,
                    ..Default::default()
                },
            },
            TaskSchedule {
                kind: TaskKind::Optimize,
                interval: config.optimize_interval(),
                constraints: Constraints {
                    requires_battery_not_low: true,
                    requires_idle: true,
                    ..Default::default()
                },
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskOutcome {
    Success,
    Skipped { reason: String },
    Failed { error: String },
}

/// Structured result of one task run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub kind: TaskKind,
    pub outcome: TaskOutcome,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub breeds_removed: usize,
    pub images_removed: usize,
    pub stats_rows_removed: usize,
    pub breeds_refreshed: usize,
    pub bytes_reclaimed: u64,
}

impl TaskReport {
    pub fn new(kind: TaskKind, started_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            outcome: TaskOutcome::Success,
            started_at,
            duration: Duration::ZERO,
            breeds_removed: 0,
            images_removed: 0,
            stats_rows_removed: 0,
            breeds_refreshed: 0,
            bytes_reclaimed: 0,
        }
    }

    pub fn skipped(kind: TaskKind, reason: impl Into<String>) -> Self {
        let mut report = Self::new(kind, Utc::now());
        report.outcome = TaskOutcome::Skipped {
            reason: reason.into(),
        };
        report
    }

    pub fn failed(kind: TaskKind, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        let mut report = Self::new(kind, started_at);
        report.outcome = TaskOutcome::Failed {
            error: error.into(),
        };
        report
    }

    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcome::Success
    }
}

/// Stops the scheduler loops; dropping it has the same effect
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every loop and wait for them; a task already running finishes first
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Cache scheduler stopped");
    }
}

pub struct CacheScheduler {
    manager: Arc<CacheManager>,
    conditions: Arc<dyn DeviceConditions>,
    schedules: Vec<TaskSchedule>,
    last_reports: Arc<DashMap<TaskKind, TaskReport>>,
}

impl CacheScheduler {
    pub fn new(manager: Arc<CacheManager>, conditions: Arc<dyn DeviceConditions>) -> Self {
        let schedules = TaskSchedule::defaults(manager.config());
        Self {
            manager,
            conditions,
            schedules,
            last_reports: Arc::new(DashMap::new()),
        }
    }

    pub fn with_schedules(mut self, schedules: Vec<TaskSchedule>) -> Self {
        self.schedules = schedules;
        self
    }

    pub fn schedules(&self) -> &[TaskSchedule] {
        &self.schedules
    }

    pub fn last_report(&self, kind: TaskKind) -> Option<TaskReport> {
        self.last_reports.get(&kind).map(|r| r.clone())
    }

    /// Spawn one loop per schedule; the first run happens one interval in
    pub fn start(&self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = self
            .schedules
            .iter()
            .map(|schedule| {
                let schedule = *schedule;
                let manager = Arc::clone(&self.manager);
                let conditions = Arc::clone(&self.conditions);
                let last_reports = Arc::clone(&self.last_reports);
                let mut shutdown_rx = shutdown_rx.clone();

                tokio::spawn(async move {
                    let start = tokio::time::Instant::now() + schedule.interval;
                    let mut ticker = tokio::time::interval_at(start, schedule.interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            _ = ticker.tick() => {}
                        }

                        let report = match schedule.constraints.unmet(conditions.as_ref()) {
                            Some(reason) => TaskReport::skipped(schedule.kind, reason),
                            None => execute(&manager, schedule.kind).await,
                        };
                        finish(&manager, &last_reports, report);
                    }
                    debug!(task = %schedule.kind, "Scheduler loop stopped");
                })
            })
            .collect();

        info!(tasks = self.schedules.len(), "Cache scheduler started");
        SchedulerHandle { shutdown_tx, tasks }
    }

    /// Run a task immediately, ignoring its constraints
    pub async fn run_now(&self, kind: TaskKind) -> TaskReport {
        let report = execute(&self.manager, kind).await;
        finish(&self.manager, &self.last_reports, report.clone());
        report
    }
}

async fn execute(manager: &Arc<CacheManager>, kind: TaskKind) -> TaskReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let manager = Arc::clone(manager);

    match tokio::spawn(async move { manager.run_task(kind).await }).await {
        Ok(report) => report,
        Err(e) => {
            let mut report = TaskReport::failed(kind, started_at, format!("task aborted: {}", e));
            report.duration = start.elapsed();
            report
        }
    }
}

fn finish(
    manager: &CacheManager,
    last_reports: &DashMap<TaskKind, TaskReport>,
    report: TaskReport,
) {
    match &report.outcome {
        TaskOutcome::Success => info!(
            task = %report.kind,
            duration_ms = report.duration.as_millis() as u64,
            breeds_removed = report.breeds_removed,
            images_removed = report.images_removed,
            breeds_refreshed = report.breeds_refreshed,
            bytes_reclaimed = report.bytes_reclaimed,
            "Task finished"
        ),
        TaskOutcome::Skipped { reason } => info!(task = %report.kind, reason = %reason, "Task skipped"),
        TaskOutcome::Failed { error } => warn!(task = %report.kind, error = %error, "Task failed"),
    }

    if !matches!(report.outcome, TaskOutcome::Skipped { .. }) {
        manager.events().publish(CacheEvent::TaskFinished {
            kind: report.kind,
            success: report.is_success(),
        });
    }
    last_reports.insert(report.kind, report);
}
