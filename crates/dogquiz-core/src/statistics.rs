//! Statistics aggregation
//!
//! Recording is best-effort: a failed counter update is logged and dropped,
//! it never fails the operation being counted. Breed and image events also
//! count towards the `Combined` row of the same day.

use crate::cache::RecordStore;
use crate::config::CacheConfig;
use crate::error::StorageError;
use crate::models::{
    CacheStats, HealthReport, HealthStatus, StatCategory, StatDelta, StatTotals,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::warn;

/// Utilization above this fraction of the budget is flagged
pub const UTILIZATION_WARNING: f64 = 0.8;
/// Expired items above this fraction of all items are flagged
pub const EXPIRED_WARNING: f64 = 0.3;

/// Day key for statistics rows (UTC calendar day)
pub fn stat_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<RecordStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    fn apply(&self, date: NaiveDate, category: StatCategory, delta: StatDelta) {
        let categories: &[StatCategory] = match category {
            StatCategory::Combined => &[StatCategory::Combined],
            StatCategory::Breeds => &[StatCategory::Breeds, StatCategory::Combined],
            StatCategory::Images => &[StatCategory::Images, StatCategory::Combined],
        };

        if let Err(e) = self
            .store
            .increment_stats(date, categories, delta, Utc::now())
        {
            warn!(error = %e, %category, "Failed to record cache statistics");
        }
    }

    pub fn record_hit(&self, date: NaiveDate, category: StatCategory) {
        self.apply(date, category, StatDelta::hit());
    }

    pub fn record_miss(&self, date: NaiveDate, category: StatCategory) {
        self.apply(date, category, StatDelta::miss());
    }

    pub fn record_cached(&self, date: NaiveDate, category: StatCategory, items: u64, bytes: u64) {
        self.apply(date, category, StatDelta::cached(items, bytes));
    }

    pub fn record_expired(&self, date: NaiveDate, category: StatCategory, count: u64) {
        self.apply(date, category, StatDelta::expired(count));
    }

    pub fn record_cleared(&self, date: NaiveDate, category: StatCategory) {
        self.apply(date, category, StatDelta::cleared());
    }

    /// Sum of `category` rows dated on or after `from`
    pub fn totals_since(
        &self,
        from: NaiveDate,
        category: StatCategory,
    ) -> Result<StatTotals, StorageError> {
        let rows = self.store.stats_since(from, category)?;
        Ok(StatTotals::from_rows(&rows))
    }

    /// Hit rate over the last `days` days, today included
    pub fn hit_rate(&self, today: NaiveDate, days: u32) -> Result<f64, StorageError> {
        let from = window_start(today, days);
        Ok(self.totals_since(from, StatCategory::Combined)?.hit_rate())
    }

    /// Delete rows older than `today - keep_days`; the row dated exactly
    /// `keep_days` ago is kept
    pub fn cleanup_old_stats(&self, today: NaiveDate, keep_days: u32) -> Result<usize, StorageError> {
        let cutoff = today - Duration::days(i64::from(keep_days));
        self.store.delete_stats_before(cutoff)
    }

    /// Snapshot of record counts and counters
    pub fn cache_stats(
        &self,
        config: &CacheConfig,
        now: DateTime<Utc>,
    ) -> Result<CacheStats, StorageError> {
        let today = stat_day(now);
        let from = window_start(today, config.stats_retention_days);

        Ok(CacheStats {
            total_breeds: self.store.breed_count()?,
            valid_breeds: self.store.valid_breed_count(now)?,
            favorite_breeds: self.store.favorite_ids()?.len(),
            total_images: self.store.image_count()?,
            valid_images: self.store.valid_image_count(now)?,
            image_bytes: self.store.total_image_bytes()?,
            max_cache_bytes: config.max_cache_bytes,
            database_bytes: self.store.file_size(),
            today: self.totals_since(today, StatCategory::Combined)?,
            retention: self.totals_since(from, StatCategory::Combined)?,
            breeds: self.totals_since(from, StatCategory::Breeds)?,
            images: self.totals_since(from, StatCategory::Images)?,
            retention_days: config.stats_retention_days,
            generated_at: now,
        })
    }
}

fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Duration::days(i64::from(days.saturating_sub(1)))
}

/// Score the cache and list what needs attention
pub fn health_report(stats: &CacheStats) -> HealthReport {
    let total = stats.total_items();
    let valid = stats.valid_items();
    let expired = stats.expired_items();

    let health_score = if total == 0 {
        100.0
    } else {
        valid as f64 * 100.0 / total as f64
    };

    let utilization = stats.utilization();
    let mut recommendations = Vec::new();

    if total == 0 {
        recommendations.push(
            "Cache is empty: run a refresh while online so quizzes work offline".to_string(),
        );
    }

    if utilization > UTILIZATION_WARNING {
        recommendations.push(format!(
            "Cache uses {:.0}% of its size budget: run optimize to evict old images",
            utilization * 100.0
        ));
    }

    if total > 0 && expired as f64 / total as f64 > EXPIRED_WARNING {
        recommendations.push(format!(
            "{} of {} cached items have expired: run cleanup or refresh",
            expired, total
        ));
    }

    HealthReport {
        health_score,
        status: HealthStatus::from_score(health_score),
        total_items: total,
        valid_items: valid,
        expired_items: expired,
        utilization,
        hit_rate: stats.hit_rate(),
        recommendations,
        generated_at: stats.generated_at,
    }
}
