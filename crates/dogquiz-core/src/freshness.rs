//! Freshness policy
//!
//! Pure time arithmetic, no I/O. Expiry is exclusive: a record whose
//! `expires_at` equals `now` is already expired.

use chrono::{DateTime, Duration, Utc};

/// Freshness classification of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Valid,
    NearExpiry,
    Expired,
}

/// `now < expires_at`
pub fn is_valid(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> bool {
    now < expires_at
}

/// `now > expires_at - threshold`
pub fn is_near_expiry(now: DateTime<Utc>, expires_at: DateTime<Utc>, threshold: Duration) -> bool {
    now > expires_at - threshold
}

/// System-wide TTL and near-expiry threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl: Duration,
    near_expiry: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Duration::days(7), Duration::hours(24))
    }
}

impl FreshnessPolicy {
    pub fn new(ttl: Duration, near_expiry: Duration) -> Self {
        Self { ttl, near_expiry }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        Self::new(config.ttl(), config.near_expiry_threshold())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn near_expiry_threshold(&self) -> Duration {
        self.near_expiry
    }

    /// Expiry stamp for a record cached at `cached_at`
    pub fn expires_at(&self, cached_at: DateTime<Utc>) -> DateTime<Utc> {
        cached_at + self.ttl
    }

    pub fn is_valid(&self, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> bool {
        is_valid(now, expires_at)
    }

    pub fn is_near_expiry(&self, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> bool {
        is_near_expiry(now, expires_at, self.near_expiry)
    }

    /// Cutoff such that `expires_at < cutoff` means near-expiry at `now`
    pub fn near_expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.near_expiry
    }

    pub fn classify(&self, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Freshness {
        if !self.is_valid(now, expires_at) {
            Freshness::Expired
        } else if self.is_near_expiry(now, expires_at) {
            Freshness::NearExpiry
        } else {
            Freshness::Valid
        }
    }
}
