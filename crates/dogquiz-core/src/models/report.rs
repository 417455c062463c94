//! Cache management reports

use super::stats::StatTotals;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of cache contents and usage counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_breeds: usize,
    pub valid_breeds: usize,
    pub favorite_breeds: usize,
    pub total_images: usize,
    pub valid_images: usize,
    /// Sum of cached image sizes (bytes)
    pub image_bytes: u64,
    /// Configured size budget (bytes)
    pub max_cache_bytes: u64,
    /// SQLite file size, 0 for in-memory stores
    pub database_bytes: u64,
    /// Combined counters for today
    pub today: StatTotals,
    /// Combined counters over the retention window
    pub retention: StatTotals,
    /// Per-category counters over the retention window
    pub breeds: StatTotals,
    pub images: StatTotals,
    pub retention_days: u32,
    pub generated_at: DateTime<Utc>,
}

impl CacheStats {
    pub fn total_items(&self) -> usize {
        self.total_breeds + self.total_images
    }

    pub fn valid_items(&self) -> usize {
        self.valid_breeds + self.valid_images
    }

    pub fn expired_items(&self) -> usize {
        self.total_items().saturating_sub(self.valid_items())
    }

    /// Fraction of the size budget in use, 0.0 when no budget is set
    pub fn utilization(&self) -> f64 {
        if self.max_cache_bytes == 0 {
            return 0.0;
        }
        self.image_bytes as f64 / self.max_cache_bytes as f64
    }

    /// Hit rate over the retention window
    pub fn hit_rate(&self) -> f64 {
        self.retention.hit_rate()
    }
}

/// Overall health level derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Score >= 80
    Healthy,
    /// Score >= 50
    Degraded,
    /// Score < 50
    Unhealthy,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthStatus::Healthy
        } else if score >= 50.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `valid / total * 100`, 100 for an empty cache
    pub health_score: f64,
    pub status: HealthStatus,
    pub total_items: usize,
    pub valid_items: usize,
    pub expired_items: usize,
    /// Fraction of the size budget in use
    pub utilization: f64,
    pub hit_rate: f64,
    /// Human-readable suggestions, empty when nothing needs attention
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy && self.recommendations.is_empty()
    }
}
