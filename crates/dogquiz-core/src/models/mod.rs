//! Data models for dogquiz

pub mod breed;
pub mod image;
pub mod report;
pub mod stats;

pub use breed::{truncate_millis, Breed, BreedRecord, Difficulty, Size, SOURCE_BUILTIN, SOURCE_DOG_API};
pub use image::{ImageRecord, ImageType};
pub use report::{CacheStats, HealthReport, HealthStatus};
pub use stats::{DailyStat, StatCategory, StatDelta, StatTotals};
