//! Per-day cache usage counters
//!
//! One row per (date, category). Rows only ever grow within a day; the store
//! creates them lazily on the first event.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatCategory {
    Breeds,
    Images,
    Combined,
}

impl StatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatCategory::Breeds => "breeds",
            StatCategory::Images => "images",
            StatCategory::Combined => "combined",
        }
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breeds" => Ok(StatCategory::Breeds),
            "images" => Ok(StatCategory::Images),
            "combined" => Ok(StatCategory::Combined),
            other => Err(format!("unknown stat category '{}'", other)),
        }
    }
}

/// One day of counters for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub category: StatCategory,
    pub hits: u64,
    pub misses: u64,
    pub bytes_cached: u64,
    pub items_cached: u64,
    pub items_expired: u64,
    pub clears: u64,
    pub last_updated_at: DateTime<Utc>,
}

impl DailyStat {
    /// Every miss triggers exactly one upstream call
    pub fn api_calls(&self) -> u64 {
        self.misses
    }
}

/// Increment applied to one daily row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatDelta {
    pub hits: u64,
    pub misses: u64,
    pub bytes_cached: u64,
    pub items_cached: u64,
    pub items_expired: u64,
    pub clears: u64,
}

impl StatDelta {
    pub fn hit() -> Self {
        Self {
            hits: 1,
            ..Default::default()
        }
    }

    pub fn miss() -> Self {
        Self {
            misses: 1,
            ..Default::default()
        }
    }

    pub fn cached(items: u64, bytes: u64) -> Self {
        Self {
            items_cached: items,
            bytes_cached: bytes,
            ..Default::default()
        }
    }

    pub fn expired(count: u64) -> Self {
        Self {
            items_expired: count,
            ..Default::default()
        }
    }

    pub fn cleared() -> Self {
        Self {
            clears: 1,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Sum of daily rows over a period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatTotals {
    pub hits: u64,
    pub misses: u64,
    pub bytes_cached: u64,
    pub items_cached: u64,
    pub items_expired: u64,
    pub clears: u64,
    pub days: u64,
}

impl StatTotals {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a DailyStat>) -> Self {
        let mut totals = Self::default();
        for row in rows {
            totals.hits += row.hits;
            totals.misses += row.misses;
            totals.bytes_cached += row.bytes_cached;
            totals.items_cached += row.items_cached;
            totals.items_expired += row.items_expired;
            totals.clears += row.clears;
            totals.days += 1;
        }
        totals
    }

    pub fn api_calls(&self) -> u64 {
        self.misses
    }

    /// `hits / (hits + misses)`, 0 when nothing was requested
    pub fn hit_rate(&self) -> f64 {
        let requests = self.hits + self.misses;
        if requests == 0 {
            return 0.0;
        }
        self.hits as f64 / requests as f64
    }
}
