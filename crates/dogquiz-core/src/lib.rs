//! dogquiz-core - Core library for dogquiz
//!
//! Persistent cache for dog breed data: SQLite record store, freshness
//! policy, cache-first repository with offline fallbacks, eviction, periodic
//! maintenance and usage statistics.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod fallback;
pub mod fetcher;
pub mod freshness;
pub mod manager;
pub mod models;
pub mod optimizer;
pub mod quiz;
pub mod repository;
pub mod scheduler;
pub mod statistics;

#[cfg(test)]
mod test_support;

pub use cache::RecordStore;
pub use classify::{BreedClassifier, Classification, PatternClassifier};
pub use config::CacheConfig;
pub use error::{CoreError, DataSource, StorageError, UpstreamError};
pub use event::{CacheEvent, EventBus, Table};
pub use fetcher::{BreedFetcher, DogApiFetcher, OfflineFetcher, RemoteBreed};
pub use freshness::FreshnessPolicy;
pub use manager::{CacheManager, CleanupSummary};
pub use models::{Breed, BreedRecord, CacheStats, Difficulty, HealthReport, ImageRecord, Size};
pub use optimizer::{CacheOptimizer, OptimizeReport};
pub use quiz::QuizQuestion;
pub use repository::{BreedLoad, BreedRepository};
pub use scheduler::{
    AlwaysReady, CacheScheduler, Constraints, DeviceConditions, ManualConditions, SchedulerHandle,
    TaskKind, TaskOutcome, TaskReport, TaskSchedule,
};
pub use statistics::StatsAggregator;
