//! Cache-first breed repository
//!
//! Every read consults the record store before upstream:
//! - valid records answer directly (hit)
//! - otherwise upstream is called and the result written through (miss)
//! - when upstream fails, stale records are served, then the built-in dataset
//!
//! `get_all_breeds` and `load_image` never return errors; the fallback chain
//! always produces something to show.

use crate::cache::{observe, RecordStore};
use crate::classify::{BreedClassifier, PatternClassifier};
use crate::config::CacheConfig;
use crate::error::{CoreError, DataSource, Result, StorageError, UpstreamError};
use crate::event::{CacheEvent, Table};
use crate::fallback;
use crate::fetcher::{BreedFetcher, RemoteBreed};
use crate::freshness::FreshnessPolicy;
use crate::models::{
    Breed, BreedRecord, Difficulty, ImageRecord, ImageType, Size, StatCategory,
};
use crate::statistics::{stat_day, StatsAggregator};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Breeds plus the fallback rung that produced them
#[derive(Debug, Clone)]
pub struct BreedLoad {
    pub breeds: Vec<Breed>,
    pub source: DataSource,
}

pub struct BreedRepository {
    store: Arc<RecordStore>,
    fetcher: Arc<dyn BreedFetcher>,
    classifier: Arc<dyn BreedClassifier>,
    stats: StatsAggregator,
    policy: FreshnessPolicy,
    config: CacheConfig,

    /// Source of the most recent breed load
    last_source: RwLock<Option<DataSource>>,
}

impl BreedRepository {
    pub fn new(store: Arc<RecordStore>, fetcher: Arc<dyn BreedFetcher>, config: CacheConfig) -> Self {
        Self {
            stats: StatsAggregator::new(Arc::clone(&store)),
            policy: FreshnessPolicy::from_config(&config),
            store,
            fetcher,
            classifier: Arc::new(PatternClassifier),
            config,
            last_source: RwLock::new(None),
        }
    }

    /// Replace the default pattern classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn BreedClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn last_source(&self) -> Option<DataSource> {
        *self.last_source.read()
    }

    pub async fn get_all_breeds(&self, force_refresh: bool) -> Vec<Breed> {
        self.get_all_breeds_with_source(force_refresh).await.breeds
    }

    pub async fn get_all_breeds_with_source(&self, force_refresh: bool) -> BreedLoad {
        let now = Utc::now();
        let load = match self.try_load(force_refresh, now).await {
            Ok(load) => load,
            Err(e) => {
                warn!(error = %e, force_refresh, "Breed load failed, using fallback data");
                self.fallback_load(now)
            }
        };

        *self.last_source.write() = Some(load.source);
        load
    }

    async fn try_load(&self, force_refresh: bool, now: DateTime<Utc>) -> Result<BreedLoad> {
        let today = stat_day(now);

        if !force_refresh {
            let valid = self.store.valid_breeds(now)?;
            if !valid.is_empty() {
                debug!(count = valid.len(), "Breed cache hit");
                self.stats.record_hit(today, StatCategory::Breeds);
                return Ok(BreedLoad {
                    breeds: into_breeds(valid),
                    source: DataSource::Cache,
                });
            }
        }

        debug!(force_refresh, "Breed cache miss");
        self.stats.record_miss(today, StatCategory::Breeds);
        let records = self.refresh_breeds().await?;
        Ok(BreedLoad {
            breeds: into_breeds(records),
            source: DataSource::Network,
        })
    }

    fn fallback_load(&self, now: DateTime<Utc>) -> BreedLoad {
        match self.store.all_breeds() {
            Ok(stale) if !stale.is_empty() => {
                info!(count = stale.len(), "Serving stale breeds");
                return BreedLoad {
                    breeds: into_breeds(stale),
                    source: DataSource::Stale,
                };
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Stale breed read failed"),
        }

        info!("Serving built-in breeds");
        BreedLoad {
            breeds: into_breeds(fallback::static_breeds(now, self.policy.ttl())),
            source: DataSource::Static,
        }
    }

    /// Fetch the full listing and write it through
    ///
    /// Fails with `UpstreamError::Empty` when nothing in the listing maps to
    /// a record.
    pub async fn refresh_breeds(&self) -> Result<Vec<BreedRecord>> {
        let remote = self.fetcher.fetch_all_breeds().await?;
        let now = Utc::now();

        let mut records = self.map_remote(&remote, now);
        if records.is_empty() {
            return Err(UpstreamError::Empty.into());
        }

        let favorites = self.store.favorite_ids()?;
        for record in &mut records {
            record.is_favorite = favorites.contains(&record.id);
        }

        self.store.upsert_breeds(&records)?;

        let bytes: u64 = records.iter().map(BreedRecord::approx_bytes).sum();
        self.stats.record_cached(
            stat_day(now),
            StatCategory::Breeds,
            records.len() as u64,
            bytes,
        );
        self.store.events().publish(CacheEvent::BreedsRefreshed {
            count: records.len(),
        });

        info!(
            fetched = remote.len(),
            cached = records.len(),
            "Breeds refreshed from upstream"
        );
        Ok(records)
    }

    /// Map the upstream listing, capped at `max_fetched_breeds` breeds and
    /// `max_variants_per_breed` variants each
    fn map_remote(&self, remote: &[RemoteBreed], now: DateTime<Utc>) -> Vec<BreedRecord> {
        let mut records = Vec::new();
        let mut breeds_taken = 0;

        for breed in remote {
            if breeds_taken >= self.config.max_fetched_breeds {
                break;
            }
            if !is_valid_key(&breed.key) {
                warn!(key = %breed.key, "Skipping breed with invalid key");
                continue;
            }

            let before = records.len();
            if breed.variants.is_empty() {
                records.push(self.map_breed(&breed.key, None, now));
            } else {
                let variants = breed
                    .variants
                    .iter()
                    .filter(|v| {
                        let ok = is_valid_key(v);
                        if !ok {
                            warn!(key = %breed.key, variant = %v, "Skipping invalid variant");
                        }
                        ok
                    })
                    .take(self.config.max_variants_per_breed);
                for variant in variants {
                    records.push(self.map_breed(&breed.key, Some(variant), now));
                }
            }

            if records.len() > before {
                breeds_taken += 1;
            }
        }
        records
    }

    fn map_breed(&self, key: &str, variant: Option<&str>, now: DateTime<Utc>) -> BreedRecord {
        let mut record = BreedRecord::new(
            key,
            variant.map(str::to_string),
            fallback::display_name(key, variant),
            now,
            self.policy.ttl(),
        );

        match fallback::profile(&record.id) {
            Some(profile) => {
                record.name = profile.name.to_string();
                profile.apply_to(&mut record);
            }
            None => fallback::apply_generic(&mut record),
        }

        let class = self.classifier.classify(key, variant);
        record.size = class.size;
        record.difficulty = class.difficulty;
        record
    }

    /// Stored record, or the built-in one when the store does not have it
    fn find_record(&self, id: &str) -> std::result::Result<Option<(BreedRecord, bool)>, StorageError> {
        if let Some(record) = self.store.get_breed(id)? {
            return Ok(Some((record, true)));
        }
        Ok(fallback::profile(id).map(|p| (p.to_record(Utc::now(), self.policy.ttl()), false)))
    }

    /// Breed by id with its cached primary image, if any; never fetches
    pub fn get_breed_by_id(&self, id: &str) -> Result<Option<Breed>> {
        let Some((record, persisted)) = self.find_record(id)? else {
            return Ok(None);
        };

        let image_url = if persisted {
            self.store
                .valid_primary_image(id, Utc::now())?
                .map(|image| image.url)
        } else {
            None
        };
        Ok(Some(Breed::from(record).with_image(image_url)))
    }

    pub async fn get_breeds_by_difficulty(&self, difficulty: Difficulty) -> Vec<Breed> {
        let mut breeds = self.get_all_breeds(false).await;
        breeds.retain(|b| b.record.difficulty == difficulty);
        breeds
    }

    pub async fn get_breeds_by_size(&self, size: Size) -> Vec<Breed> {
        let mut breeds = self.get_all_breeds(false).await;
        breeds.retain(|b| b.record.size == size);
        breeds
    }

    /// Search stored breeds; falls back to whatever `get_all_breeds` serves
    /// when the store has no match
    pub async fn search_breeds(&self, query: &str) -> Vec<Breed> {
        match self.store.search_breeds(query) {
            Ok(found) if !found.is_empty() => return into_breeds(found),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Breed search failed"),
        }

        let needle = query.trim().to_lowercase();
        let mut breeds = self.get_all_breeds(false).await;
        breeds.retain(|b| matches_query(&b.record, &needle));
        breeds
    }

    pub fn get_favorites(&self) -> Result<Vec<Breed>> {
        Ok(into_breeds(self.store.favorite_breeds()?))
    }

    pub fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
        if !self.store.set_favorite(id, favorite)? {
            return Err(CoreError::BreedNotFound { id: id.to_string() });
        }
        debug!(breed_id = id, favorite, "Favorite updated");
        Ok(())
    }

    /// Breed with its primary image attached
    ///
    /// `None` only when the breed is unknown. Image fetch failures leave
    /// `image_url` empty.
    pub async fn load_image(&self, id: &str) -> Option<Breed> {
        let now = Utc::now();
        let today = stat_day(now);

        let (record, persisted) = match self.find_record(id) {
            Ok(Some(found)) => found,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, breed_id = id, "Breed lookup failed");
                return None;
            }
        };

        if persisted {
            match self.store.valid_primary_image(id, now) {
                Ok(Some(image)) => {
                    if let Err(e) = self.store.touch_image(&image.id, now) {
                        warn!(error = %e, "Failed to update image access stats");
                    }
                    self.stats.record_hit(today, StatCategory::Images);
                    debug!(breed_id = id, "Image cache hit");
                    return Some(Breed::from(record).with_image(Some(image.url)));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, breed_id = id, "Image cache read failed"),
            }
        }

        self.stats.record_miss(today, StatCategory::Images);
        let url = match self
            .fetcher
            .fetch_image(&record.breed_key, record.variant.as_deref())
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, breed_id = id, "Image fetch failed");
                return Some(Breed::from(record));
            }
        };

        if persisted {
            let size = self.fetcher.probe_image_size(&url).await.unwrap_or(0);
            let image = ImageRecord::new(id, url.as_str(), ImageType::Primary, size, now, self.policy.ttl());
            match self
                .store
                .set_primary_image(&image, self.config.max_images_per_breed)
            {
                Ok(_) => self
                    .stats
                    .record_cached(today, StatCategory::Images, 1, size),
                Err(e) => warn!(error = %e, breed_id = id, "Failed to cache image"),
            }
        }

        Some(Breed::from(record).with_image(Some(url)))
    }

    /// Up to `count` gallery image URLs, cache-first
    ///
    /// The count is capped so a gallery plus the primary image fit within
    /// `max_images_per_breed`. Upstream failure returns whatever is cached.
    pub async fn load_gallery(&self, id: &str, count: usize) -> Result<Vec<String>> {
        let now = Utc::now();
        let today = stat_day(now);
        let count = count.min(self.config.max_images_per_breed.saturating_sub(1).max(1));

        let Some((record, persisted)) = self.find_record(id)? else {
            return Err(CoreError::BreedNotFound { id: id.to_string() });
        };

        let cached = if persisted {
            self.store
                .valid_images_of_type(id, ImageType::Gallery, now)?
        } else {
            Vec::new()
        };

        if cached.len() >= count {
            for image in cached.iter().take(count) {
                self.store.touch_image(&image.id, now)?;
            }
            self.stats.record_hit(today, StatCategory::Images);
            return Ok(cached.into_iter().take(count).map(|i| i.url).collect());
        }

        self.stats.record_miss(today, StatCategory::Images);
        let urls = match self
            .fetcher
            .fetch_images(&record.breed_key, record.variant.as_deref(), count)
            .await
        {
            Ok(urls) => urls,
            Err(e) => {
                warn!(error = %e, breed_id = id, "Gallery fetch failed, serving cached images");
                return Ok(cached.into_iter().map(|i| i.url).collect());
            }
        };

        if persisted && !urls.is_empty() {
            let mut images = Vec::with_capacity(urls.len());
            let mut bytes = 0u64;
            for url in &urls {
                let size = self.fetcher.probe_image_size(url).await.unwrap_or(0);
                bytes += size;
                images.push(ImageRecord::new(
                    id,
                    url.as_str(),
                    ImageType::Gallery,
                    size,
                    now,
                    self.policy.ttl(),
                ));
            }
            self.store
                .upsert_images(&images, self.config.max_images_per_breed)?;
            self.stats
                .record_cached(today, StatCategory::Images, images.len() as u64, bytes);
        }

        Ok(urls.into_iter().take(count).collect())
    }

    /// Random sample of stored breeds, or of whatever `get_all_breeds`
    /// serves when the store is empty
    pub async fn random_breeds(&self, n: usize) -> Vec<Breed> {
        match self.store.random_breeds(n) {
            Ok(found) if !found.is_empty() => return into_breeds(found),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Random breed sample failed"),
        }

        let mut breeds = self.get_all_breeds(false).await;
        breeds.shuffle(&mut rand::thread_rng());
        breeds.truncate(n);
        breeds
    }

    /// Breeds or images expiring within the near-expiry window
    pub fn near_expiry_counts(&self, now: DateTime<Utc>) -> std::result::Result<(usize, usize), StorageError> {
        let cutoff = self.policy.near_expiry_cutoff(now);
        Ok((
            self.store.breeds_expiring_before(cutoff)?.len(),
            self.store.images_expiring_before(cutoff)?.len(),
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.store.events().subscribe()
    }

    /// Live favorites list; must be called inside a tokio runtime
    pub fn observe_favorites(&self) -> Result<watch::Receiver<Vec<Breed>>> {
        let rx = observe(&self.store, &[Table::Breeds], |store| {
            Ok(into_breeds(store.favorite_breeds()?))
        })?;
        Ok(rx)
    }
}

fn into_breeds(records: Vec<BreedRecord>) -> Vec<Breed> {
    records.into_iter().map(Breed::from).collect()
}

/// Upstream keys are lowercase ASCII letters
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_lowercase())
}

fn matches_query(record: &BreedRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record.name.to_lowercase().contains(needle)
        || record.breed_key.contains(needle)
        || record.origin.to_lowercase().contains(needle)
        || record
            .temperament
            .iter()
            .any(|t| t.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFetcher;
    use chrono::Duration;

    fn repository(fetcher: ScriptedFetcher) -> (Arc<ScriptedFetcher>, BreedRepository) {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let fetcher = Arc::new(fetcher);
        let repo = BreedRepository::new(store, fetcher.clone(), CacheConfig::default());
        (fetcher, repo)
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("retriever"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("St Bernard"));
        assert!(!is_valid_key("k9"));
    }

    #[tokio::test]
    async fn test_variants_capped_and_named() {
        let (_, repo) = repository(ScriptedFetcher::with_breeds(vec![RemoteBreed::new(
            "terrier",
            vec!["yorkshire".into(), "cairn".into(), "border".into(), "irish".into()],
        )]));

        let records = repo.refresh_breeds().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "terrier-yorkshire");
        assert_eq!(records[0].name, "Yorkshire Terrier");
        assert_eq!(records[0].variant.as_deref(), Some("yorkshire"));
    }

    #[tokio::test]
    async fn test_invalid_keys_skipped() {
        let (_, repo) = repository(ScriptedFetcher::with_breeds(vec![
            RemoteBreed::new("", vec![]),
            RemoteBreed::new("Bad Key", vec![]),
            RemoteBreed::new("pug", vec![]),
        ]));

        let records = repo.refresh_breeds().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Pug");
        assert!(!records[0].description.is_empty());
    }

    #[tokio::test]
    async fn test_zero_mappable_breeds_is_error() {
        let (_, repo) = repository(ScriptedFetcher::with_breeds(vec![RemoteBreed::new(
            "1234",
            vec![],
        )]));

        let err = repo.refresh_breeds().await.unwrap_err();
        assert!(matches!(err, CoreError::Upstream(UpstreamError::Empty)));
    }

    #[tokio::test]
    async fn test_refresh_keeps_favorites() {
        let (_, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug", "beagle"]));

        repo.get_all_breeds(false).await;
        repo.set_favorite("pug", true).unwrap();

        let refreshed = repo.get_all_breeds(true).await;
        let pug = refreshed.iter().find(|b| b.id() == "pug").unwrap();
        assert!(pug.record.is_favorite);
        assert_eq!(repo.get_favorites().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_favorite_unknown_breed() {
        let (_, repo) = repository(ScriptedFetcher::failing());
        let err = repo.set_favorite("ghost", true).unwrap_err();
        assert!(matches!(err, CoreError::BreedNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_image_hit_after_miss() {
        let (fetcher, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug"]));
        repo.get_all_breeds(false).await;

        let first = repo.load_image("pug").await.unwrap();
        assert!(first.image_url.is_some());
        let second = repo.load_image("pug").await.unwrap();
        assert_eq!(first.image_url, second.image_url);
        assert_eq!(fetcher.image_calls(), 1);

        let image = repo.store().primary_image("pug").unwrap().unwrap();
        assert_eq!(image.access_count, 1);
    }

    #[tokio::test]
    async fn test_load_image_failure_is_not_fatal() {
        let (fetcher, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug"]));
        repo.get_all_breeds(false).await;
        fetcher.set_failing(true);

        let breed = repo.load_image("pug").await.unwrap();
        assert_eq!(breed.id(), "pug");
        assert!(breed.image_url.is_none());
        assert!(repo.load_image("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_load_image_for_builtin_breed() {
        let (_, repo) = repository(ScriptedFetcher::failing());
        assert!(repo.load_image("beagle").await.is_some());
    }

    #[tokio::test]
    async fn test_gallery_served_from_cache_second_time() {
        let (fetcher, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug"]));
        repo.get_all_breeds(false).await;

        let first = repo.load_gallery("pug", 3).await.unwrap();
        assert_eq!(first.len(), 3);
        let second = repo.load_gallery("pug", 3).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(fetcher.gallery_calls(), 1);
    }

    #[tokio::test]
    async fn test_gallery_images_are_sized() {
        let (_, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug"]));
        repo.get_all_breeds(false).await;

        repo.load_gallery("pug", 3).await.unwrap();
        let gallery = repo
            .store()
            .valid_images_of_type("pug", ImageType::Gallery, Utc::now())
            .unwrap();
        assert_eq!(gallery.len(), 3);
        assert!(gallery.iter().all(|image| image.byte_size == 2048));
        assert_eq!(repo.store().total_image_bytes().unwrap(), 3 * 2048);
    }

    #[tokio::test]
    async fn test_random_breeds_from_store() {
        let (fetcher, repo) =
            repository(ScriptedFetcher::with_breed_keys(&["pug", "beagle", "akita", "boxer"]));
        repo.get_all_breeds(false).await;

        let sample = repo.random_breeds(3).await;
        assert_eq!(sample.len(), 3);
        let mut ids: Vec<_> = sample.iter().map(|b| b.id().to_string()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        assert_eq!(repo.random_breeds(10).await.len(), 4);
        assert_eq!(fetcher.listing_calls(), 1);
    }

    #[tokio::test]
    async fn test_random_breeds_fall_back_to_builtin() {
        let (_, repo) = repository(ScriptedFetcher::failing());

        let sample = repo.random_breeds(2).await;
        assert_eq!(sample.len(), 2);
        assert_eq!(repo.last_source(), Some(DataSource::Static));
        assert_eq!(repo.store().breed_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_observe_favorites_follows_toggles() {
        let (_, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug", "beagle"]));
        repo.get_all_breeds(false).await;

        let mut rx = repo.observe_favorites().unwrap();
        assert!(rx.borrow_and_update().is_empty());

        repo.set_favorite("beagle", true).unwrap();
        rx.changed().await.unwrap();
        let favorites: Vec<_> = rx
            .borrow_and_update()
            .iter()
            .map(|b| b.id().to_string())
            .collect();
        assert_eq!(favorites, vec!["beagle".to_string()]);

        repo.set_favorite("beagle", false).unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn test_search_and_filters() {
        let (_, repo) = repository(ScriptedFetcher::with_breed_keys(&["pug", "beagle", "basenji"]));
        repo.get_all_breeds(false).await;

        let found = repo.search_breeds("BEAG").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "beagle");

        let hard = repo.get_breeds_by_difficulty(Difficulty::Hard).await;
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].id(), "basenji");

        let small = repo.get_breeds_by_size(Size::Small).await;
        assert!(small.iter().any(|b| b.id() == "pug"));
    }

    #[tokio::test]
    async fn test_near_expiry_counts() {
        let (_, repo) = repository(ScriptedFetcher::failing());
        let now = Utc::now();
        let mut record = BreedRecord::new("pug", None, "Pug", now, Duration::days(7));
        record.expires_at = record.cached_at + Duration::hours(2);
        repo.store().upsert_breed(&record).unwrap();
        repo.store()
            .upsert_breed(&BreedRecord::new("akita", None, "Akita", now, Duration::days(7)))
            .unwrap();

        assert_eq!(repo.near_expiry_counts(now).unwrap(), (1, 0));
    }

    #[tokio::test]
    async fn test_last_source_tracks_fallback() {
        let (_, repo) = repository(ScriptedFetcher::failing());
        assert!(repo.last_source().is_none());

        let load = repo.get_all_breeds_with_source(false).await;
        assert_eq!(load.source, DataSource::Static);
        assert_eq!(repo.last_source(), Some(DataSource::Static));
    }
}
