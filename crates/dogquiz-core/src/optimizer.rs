//! Size-bounded eviction
//!
//! Two phases:
//! 1. drop everything expired (images, then breeds) and trim the breed table
//!    to its row limit
//! 2. while image bytes exceed the budget, evict least recently accessed
//!    images in batches sized from the overage and the average image size
//!
//! A batch is `ceil(overage / average) + EVICTION_SLACK` images, so one pass
//! may overshoot the target by at most that batch. The loop re-checks after
//! each batch and stops when the store is under budget or a batch deletes
//! nothing. Every batch deletes at least one image, so the loop ends.

use crate::cache::RecordStore;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Extra images evicted per batch to absorb size estimate error
pub const EVICTION_SLACK: usize = 1;

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizeReport {
    pub expired_breeds: usize,
    pub expired_images: usize,
    pub trimmed_breeds: usize,
    pub evicted_images: usize,
    /// Images deleted along with expired or trimmed breeds
    pub cascaded_images: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    /// Image bytes removed by expiry and eviction
    pub bytes_reclaimed: u64,
    pub eviction_passes: usize,
    pub duration: Duration,
}

impl OptimizeReport {
    pub fn images_removed(&self) -> usize {
        self.expired_images + self.evicted_images + self.cascaded_images
    }

    pub fn breeds_removed(&self) -> usize {
        self.expired_breeds + self.trimmed_breeds
    }
}

pub struct CacheOptimizer {
    store: Arc<RecordStore>,
    max_cached_breeds: usize,
}

impl CacheOptimizer {
    pub fn new(store: Arc<RecordStore>, max_cached_breeds: usize) -> Self {
        Self {
            store,
            max_cached_breeds,
        }
    }

    /// Bring total image bytes under `max_bytes`
    pub fn optimize(
        &self,
        max_bytes: u64,
        now: DateTime<Utc>,
    ) -> Result<OptimizeReport, StorageError> {
        let start = Instant::now();
        let mut report = OptimizeReport {
            bytes_before: self.store.total_image_bytes()?,
            ..Default::default()
        };

        let (expired_images, expired_bytes) = self.store.delete_expired_images(now)?;
        report.expired_images = expired_images;
        report.bytes_reclaimed += expired_bytes;
        let expired = self.store.delete_expired_breeds(now)?;
        let trimmed = self.store.trim_breeds(self.max_cached_breeds)?;
        report.expired_breeds = expired.breeds;
        report.trimmed_breeds = trimmed.breeds;
        report.cascaded_images = expired.images + trimmed.images;
        report.bytes_reclaimed += expired.image_bytes + trimmed.image_bytes;

        let mut total = self.store.total_image_bytes()?;
        while total > max_bytes {
            let count = self.store.image_count()?;
            if count == 0 {
                break;
            }

            let batch = eviction_batch(total - max_bytes, total, count);
            let (evicted, bytes) = self.store.delete_least_recent_images(batch)?;
            report.eviction_passes += 1;
            debug!(
                pass = report.eviction_passes,
                batch, evicted, bytes, "LRU eviction pass"
            );
            if evicted == 0 {
                break;
            }

            report.evicted_images += evicted;
            report.bytes_reclaimed += bytes;
            total = self.store.total_image_bytes()?;
        }

        report.bytes_after = total;
        report.duration = start.elapsed();

        info!(
            expired_images = report.expired_images,
            expired_breeds = report.expired_breeds,
            evicted = report.evicted_images,
            bytes_after = report.bytes_after,
            max_bytes,
            "Cache optimized"
        );
        Ok(report)
    }
}

/// Images to evict for a given overage
///
/// Zero-byte images (size unknown) make the average 0; one image per byte of
/// overage is then the fallback, capped at the image count.
pub fn eviction_batch(overage: u64, total_bytes: u64, image_count: usize) -> usize {
    if image_count == 0 || overage == 0 {
        return 0;
    }

    let average = total_bytes / image_count as u64;
    let needed = if average == 0 {
        overage
    } else {
        overage.div_ceil(average)
    };

    (needed as usize)
        .saturating_add(EVICTION_SLACK)
        .min(image_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{truncate_millis, BreedRecord, ImageRecord, ImageType};
    use chrono::Duration as ChronoDuration;

    fn seeded_store(images: &[(u64, i64)]) -> Arc<RecordStore> {
        // (byte_size, minutes since last access)
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let now = truncate_millis(Utc::now());

        for (i, (bytes, age)) in images.iter().enumerate() {
            let key = format!("breed{}", i);
            store
                .upsert_breed(&BreedRecord::new(&key, None, &key, now, ChronoDuration::days(7)))
                .unwrap();
            let mut image = ImageRecord::new(
                &key,
                format!("https://x/{}.jpg", i),
                ImageType::Primary,
                *bytes,
                now,
                ChronoDuration::days(7),
            );
            image.last_accessed_at = now - ChronoDuration::minutes(*age);
            store.set_primary_image(&image, 5).unwrap();
        }
        store
    }

    #[test]
    fn test_eviction_batch() {
        assert_eq!(eviction_batch(0, 1000, 10), 0);
        // average 100, overage 250 -> 3 + slack
        assert_eq!(eviction_batch(250, 1000, 10), 4);
        assert_eq!(eviction_batch(5000, 1000, 10), 10);
        assert_eq!(eviction_batch(10, 0, 3), 3);
    }

    #[test]
    fn test_under_budget_is_noop() {
        let store = seeded_store(&[(100, 1), (100, 2)]);
        let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);

        let report = optimizer.optimize(1000, Utc::now()).unwrap();
        assert_eq!(report.evicted_images, 0);
        assert_eq!(report.eviction_passes, 0);
        assert_eq!(store.image_count().unwrap(), 2);
    }

    #[test]
    fn test_evicts_least_recent_first() {
        // oldest access first: 40, 30, 20, 10 minutes ago
        let store = seeded_store(&[(100, 40), (100, 30), (100, 20), (100, 10)]);
        let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);

        let report = optimizer.optimize(250, Utc::now()).unwrap();
        assert!(report.bytes_after <= 250);
        assert_eq!(report.bytes_before, 400);
        // overage 150 / average 100 -> 2 + slack 1
        assert_eq!(report.evicted_images, 3);
        assert!(store.primary_image("breed3").unwrap().is_some());
        assert!(store.primary_image("breed0").unwrap().is_none());
    }

    #[test]
    fn test_expired_removed_before_lru() {
        let store = seeded_store(&[(300, 1), (100, 50)]);
        let now = Utc::now();
        let mut expired = store.primary_image("breed0").unwrap().unwrap();
        expired.expires_at = truncate_millis(now) - ChronoDuration::seconds(1);
        store.upsert_image(&expired).unwrap();

        let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);
        let report = optimizer.optimize(150, now).unwrap();

        assert_eq!(report.expired_images, 1);
        assert_eq!(report.evicted_images, 0);
        assert_eq!(report.bytes_reclaimed, 300);
        assert_eq!(store.total_image_bytes().unwrap(), 100);
    }

    #[test]
    fn test_unreachable_budget_stops_when_empty() {
        let store = seeded_store(&[(100, 1), (100, 2)]);
        let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);

        let report = optimizer.optimize(0, Utc::now()).unwrap();
        assert_eq!(store.image_count().unwrap(), 0);
        assert_eq!(report.bytes_after, 0);
    }

    #[test]
    fn test_zero_byte_images_do_not_stall_eviction() {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let now = truncate_millis(Utc::now());
        store
            .upsert_breed(&BreedRecord::new("pug", None, "Pug", now, ChronoDuration::days(7)))
            .unwrap();

        // 100 unsized gallery images, all older than the one sized primary
        for i in 0..100 {
            let mut image = ImageRecord::new(
                "pug",
                format!("https://x/g{}.jpg", i),
                ImageType::Gallery,
                0,
                now,
                ChronoDuration::days(7),
            );
            image.last_accessed_at = now - ChronoDuration::minutes(200 - i);
            store.upsert_image(&image).unwrap();
        }
        let primary = ImageRecord::new(
            "pug",
            "https://x/p.jpg",
            ImageType::Primary,
            1000,
            now,
            ChronoDuration::days(7),
        );
        store.upsert_image(&primary).unwrap();

        let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);
        let report = optimizer.optimize(999, Utc::now()).unwrap();

        assert_eq!(report.bytes_after, 0);
        assert_eq!(store.image_count().unwrap(), 0);
        assert_eq!(report.evicted_images, 101);
        assert_eq!(report.bytes_reclaimed, 1000);
    }

    #[test]
    fn test_mixed_sizes_end_under_budget() {
        let sizes = [0, 0, 500, 0, 300, 0, 0, 200, 0, 50];
        let images: Vec<(u64, i64)> = sizes
            .iter()
            .enumerate()
            .map(|(i, bytes)| (*bytes, 100 - i as i64))
            .collect();

        for budget in [0, 49, 250, 700, 1049, 1050] {
            let store = seeded_store(&images);
            let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);
            let report = optimizer.optimize(budget, Utc::now()).unwrap();

            assert!(
                report.bytes_after <= budget || store.image_count().unwrap() == 0,
                "budget {} left {} bytes",
                budget,
                report.bytes_after
            );
            assert_eq!(report.bytes_after, store.total_image_bytes().unwrap());
        }
    }

    #[test]
    fn test_expired_breed_images_counted() {
        let store = seeded_store(&[(400, 1), (100, 2)]);
        let now = Utc::now();
        let mut stale = store.get_breed("breed0").unwrap().unwrap();
        stale.expires_at = truncate_millis(now) - ChronoDuration::seconds(1);
        store.upsert_breed(&stale).unwrap();

        let optimizer = CacheOptimizer::new(Arc::clone(&store), 200);
        let report = optimizer.optimize(u64::MAX, now).unwrap();

        assert_eq!(report.expired_breeds, 1);
        assert_eq!(report.cascaded_images, 1);
        assert_eq!(report.images_removed(), 1);
        assert_eq!(report.bytes_reclaimed, 400);
        assert_eq!(store.total_image_bytes().unwrap(), 100);
    }

    #[test]
    fn test_breed_limit_trims_oldest() {
        let store = seeded_store(&[(10, 1), (10, 2), (10, 3)]);
        let optimizer = CacheOptimizer::new(Arc::clone(&store), 2);

        let report = optimizer.optimize(u64::MAX, Utc::now()).unwrap();
        assert_eq!(report.trimmed_breeds, 1);
        assert_eq!(store.breed_count().unwrap(), 2);
    }
}
