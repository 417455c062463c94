//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dogquiz_core::{
    BreedFetcher, BreedRepository, CacheConfig, RecordStore, RemoteBreed, UpstreamError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Fetcher serving a fixed listing, with call counters and a failure switch
pub struct FakeDogApi {
    breeds: Vec<RemoteBreed>,
    failing: AtomicBool,
    listing_calls: AtomicUsize,
    image_calls: AtomicUsize,
}

impl FakeDogApi {
    pub fn new(breeds: Vec<RemoteBreed>) -> Self {
        Self {
            breeds,
            failing: AtomicBool::new(false),
            listing_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    /// `count` variant-free breeds with lowercase alphabetic keys
    pub fn with_generated(count: usize) -> Self {
        Self::new((0..count).map(|i| RemoteBreed::new(letter_key(i), vec![])).collect())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), UpstreamError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Offline);
        }
        Ok(())
    }
}

/// `breedaa`, `breedab`, ... unique for i < 676
pub fn letter_key(i: usize) -> String {
    let a = (b'a' + (i / 26) as u8) as char;
    let b = (b'a' + (i % 26) as u8) as char;
    format!("breed{}{}", a, b)
}

#[async_trait]
impl BreedFetcher for FakeDogApi {
    async fn fetch_all_breeds(&self) -> Result<Vec<RemoteBreed>, UpstreamError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.breeds.clone())
    }

    async fn fetch_image(
        &self,
        breed_key: &str,
        variant: Option<&str>,
    ) -> Result<String, UpstreamError> {
        let n = self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(format!(
            "https://images.test/{}/{}/{}.jpg",
            breed_key,
            variant.unwrap_or("any"),
            n
        ))
    }

    async fn fetch_images(
        &self,
        breed_key: &str,
        _variant: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, UpstreamError> {
        self.check()?;
        Ok((0..count)
            .map(|i| format!("https://images.test/{}/gallery/{}.jpg", breed_key, i))
            .collect())
    }

    async fn probe_image_size(&self, _url: &str) -> Option<u64> {
        Some(4096)
    }
}

/// On-disk store in a temp dir; keep the `TempDir` alive for the test
pub fn open_store() -> (TempDir, Arc<RecordStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordStore::open(dir.path()).unwrap());
    (dir, store)
}

pub fn repository(store: Arc<RecordStore>, api: Arc<FakeDogApi>) -> BreedRepository {
    BreedRepository::new(store, api, CacheConfig::default())
}
