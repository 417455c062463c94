//! Record store for dogquiz-core
//!
//! SQLite-backed durable storage for the three record kinds (breeds, images,
//! daily statistics), plus live queries driven by the store's change events.

mod breeds;
mod daily_stats;
mod images;
pub mod live;
pub mod record_store;

pub use breeds::BreedPurge;
pub use live::observe;
pub use record_store::{RecordStore, CACHE_DB_FILE};
