//! Cache configuration
//!
//! Every knob has a default matching the shipped behavior; a TOML file only
//! needs the keys it overrides.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Configuration for the cache subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for every cached record
    pub ttl_days: u32,

    /// Window before expiry in which a record counts as near-expiry
    pub near_expiry_hours: u32,

    /// Total image byte budget enforced by the optimizer
    pub max_cache_bytes: u64,

    /// Images kept per breed (primary included)
    pub max_images_per_breed: usize,

    /// Breed rows kept by the optimizer
    pub max_cached_breeds: usize,

    /// Breeds taken from one upstream listing
    pub max_fetched_breeds: usize,

    /// Sub-breed variants taken per breed
    pub max_variants_per_breed: usize,

    pub cleanup_interval_hours: u32,
    pub refresh_interval_hours: u32,
    pub optimize_interval_hours: u32,

    /// Days of daily statistics kept by cleanup
    pub stats_retention_days: u32,

    /// Base URL of the dog.ceo API
    pub api_base_url: String,

    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: 7,
            near_expiry_hours: 24,
            max_cache_bytes: 100 * MIB,
            max_images_per_breed: 5,
            max_cached_breeds: 200,
            max_fetched_breeds: 50,
            max_variants_per_breed: 3,
            cleanup_interval_hours: 6,
            refresh_interval_hours: 12,
            optimize_interval_hours: 24,
            stats_retention_days: 90,
            api_base_url: "https://dog.ceo/api".to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl CacheConfig {
    /// Load from a TOML file, missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CacheConfig =
            toml::from_str(&content).map_err(|e| CoreError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let zero_fields = [
            ("ttl_days", self.ttl_days as u64),
            ("max_cache_bytes", self.max_cache_bytes),
            ("max_images_per_breed", self.max_images_per_breed as u64),
            ("max_cached_breeds", self.max_cached_breeds as u64),
            ("max_fetched_breeds", self.max_fetched_breeds as u64),
            ("cleanup_interval_hours", self.cleanup_interval_hours as u64),
            ("refresh_interval_hours", self.refresh_interval_hours as u64),
            ("optimize_interval_hours", self.optimize_interval_hours as u64),
            ("stats_retention_days", self.stats_retention_days as u64),
        ];

        if let Some((name, _)) = zero_fields.iter().find(|(_, v)| *v == 0) {
            return Err(CoreError::InvalidConfig {
                message: format!("{} must be greater than zero", name),
            });
        }

        if (self.near_expiry_hours as u64) >= (self.ttl_days as u64) * 24 {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "near_expiry_hours ({}) must be shorter than the TTL ({} days)",
                    self.near_expiry_hours, self.ttl_days
                ),
            });
        }

        Ok(())
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.ttl_days as i64)
    }

    pub fn near_expiry_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.near_expiry_hours as i64)
    }

    pub fn cleanup_interval(&self) -> Duration {
        hours(self.cleanup_interval_hours)
    }

    pub fn refresh_interval(&self) -> Duration {
        hours(self.refresh_interval_hours)
    }

    pub fn optimize_interval(&self) -> Duration {
        hours(self.optimize_interval_hours)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn hours(h: u32) -> Duration {
    Duration::from_secs(h as u64 * 3600)
}
