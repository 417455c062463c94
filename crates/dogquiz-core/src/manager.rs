//! Cache management API
//!
//! Owns the maintenance operations (clear, cleanup, refresh, optimize) and
//! the task bodies the scheduler runs. Every task reports a structured
//! [`TaskReport`]; errors become `TaskOutcome::Failed`, never a returned error.

use crate::cache::RecordStore;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::event::{CacheEvent, EventBus};
use crate::fetcher::BreedFetcher;
use crate::models::{CacheStats, HealthReport, StatCategory};
use crate::optimizer::{CacheOptimizer, OptimizeReport};
use crate::repository::BreedRepository;
use crate::scheduler::{TaskKind, TaskOutcome, TaskReport};
use crate::statistics::{health_report, stat_day};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Rows removed by one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub breeds_removed: usize,
    pub images_removed: usize,
    pub bytes_reclaimed: u64,
    pub stats_rows_removed: usize,
}

pub struct CacheManager {
    repository: Arc<BreedRepository>,
    optimizer: CacheOptimizer,
}

impl CacheManager {
    pub fn new(repository: Arc<BreedRepository>) -> Self {
        let optimizer = CacheOptimizer::new(
            Arc::clone(repository.store()),
            repository.config().max_cached_breeds,
        );
        Self {
            repository,
            optimizer,
        }
    }

    /// Open the record store in `data_dir` and wire a repository over it
    pub fn open(
        config: CacheConfig,
        data_dir: &Path,
        fetcher: Arc<dyn BreedFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(RecordStore::open(data_dir)?);
        let repository = Arc::new(BreedRepository::new(store, fetcher, config));
        Ok(Self::new(repository))
    }

    pub fn repository(&self) -> &Arc<BreedRepository> {
        &self.repository
    }

    pub fn config(&self) -> &CacheConfig {
        self.repository.config()
    }

    pub fn events(&self) -> &EventBus {
        self.store().events()
    }

    fn store(&self) -> &RecordStore {
        self.repository.store()
    }

    /// Remove every cached breed and image; statistics are kept
    pub fn clear_all(&self) -> Result<usize> {
        let images = self.store().delete_all_images()?;
        let breeds = self.store().delete_all_breeds()?;

        self.repository
            .stats()
            .record_cleared(stat_day(Utc::now()), StatCategory::Combined);
        self.events().publish(CacheEvent::Cleared);

        info!(breeds, images, "Cache cleared");
        Ok(breeds + images)
    }

    /// Delete expired images and breeds, counting them as expirations
    pub fn clear_expired(&self) -> Result<CleanupSummary> {
        self.clear_expired_at(Utc::now())
    }

    fn clear_expired_at(&self, now: DateTime<Utc>) -> Result<CleanupSummary> {
        let today = stat_day(now);
        let stats = self.repository.stats();

        let (expired_images, expired_bytes) = self.store().delete_expired_images(now)?;
        let purge = self.store().delete_expired_breeds(now)?;
        let images_removed = expired_images + purge.images;
        let bytes_reclaimed = expired_bytes + purge.image_bytes;
        let breeds_removed = purge.breeds;

        if images_removed > 0 {
            stats.record_expired(today, StatCategory::Images, images_removed as u64);
        }
        if breeds_removed > 0 {
            stats.record_expired(today, StatCategory::Breeds, breeds_removed as u64);
        }

        Ok(CleanupSummary {
            breeds_removed,
            images_removed,
            bytes_reclaimed,
            stats_rows_removed: 0,
        })
    }

    pub fn get_statistics(&self) -> Result<CacheStats> {
        Ok(self
            .repository
            .stats()
            .cache_stats(self.config(), Utc::now())?)
    }

    pub fn get_health_report(&self) -> Result<HealthReport> {
        Ok(health_report(&self.get_statistics()?))
    }

    pub async fn trigger_refresh(&self) -> TaskReport {
        self.run_task(TaskKind::Refresh).await
    }

    pub async fn trigger_optimize(&self) -> TaskReport {
        self.run_task(TaskKind::Optimize).await
    }

    pub async fn trigger_cleanup(&self) -> TaskReport {
        self.run_task(TaskKind::Cleanup).await
    }

    /// Optimizer pass against an explicit budget
    pub fn optimize(&self, max_bytes: u64) -> Result<OptimizeReport> {
        Ok(self.optimizer.optimize(max_bytes, Utc::now())?)
    }

    /// Run one task body and report; never fails
    pub async fn run_task(&self, kind: TaskKind) -> TaskReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut report = TaskReport::new(kind, started_at);

        let result = match kind {
            TaskKind::Cleanup => self.cleanup_task(&mut report),
            TaskKind::Refresh => self.refresh_task(&mut report).await,
            TaskKind::Optimize => self.optimize_task(&mut report),
        };

        if let Err(e) = result {
            report.outcome = TaskOutcome::Failed {
                error: e.to_string(),
            };
        }
        report.duration = start.elapsed();
        report
    }

    /// Expired records, then statistics past the retention window
    fn cleanup_task(&self, report: &mut TaskReport) -> Result<()> {
        let now = Utc::now();
        let summary = self.clear_expired_at(now)?;
        let stats_rows_removed = self
            .repository
            .stats()
            .cleanup_old_stats(stat_day(now), self.config().stats_retention_days)?;

        report.breeds_removed += summary.breeds_removed;
        report.images_removed += summary.images_removed;
        report.bytes_reclaimed += summary.bytes_reclaimed;
        report.stats_rows_removed += stats_rows_removed;
        Ok(())
    }

    /// Bulk refresh when anything is inside the near-expiry window
    async fn refresh_task(&self, report: &mut TaskReport) -> Result<()> {
        let (breeds, images) = self.repository.near_expiry_counts(Utc::now())?;
        if breeds == 0 && images == 0 {
            debug!("Nothing near expiry, refresh not needed");
            return Ok(());
        }

        debug!(breeds, images, "Near-expiry records found, refreshing");
        let refreshed = self.repository.refresh_breeds().await?;
        report.breeds_refreshed = refreshed.len();
        Ok(())
    }

    /// Optimizer against the configured budget, then cleanup
    fn optimize_task(&self, report: &mut TaskReport) -> Result<()> {
        let optimized = self.optimize(self.config().max_cache_bytes)?;
        report.breeds_removed += optimized.breeds_removed();
        report.images_removed += optimized.images_removed();
        report.bytes_reclaimed += optimized.bytes_reclaimed;

        self.cleanup_task(report)
    }
}
