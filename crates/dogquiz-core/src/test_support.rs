//! In-process fetcher for unit tests

use crate::error::UpstreamError;
use crate::fetcher::{BreedFetcher, RemoteBreed};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) struct ScriptedFetcher {
    breeds: Vec<RemoteBreed>,
    failing: AtomicBool,
    listing_calls: AtomicUsize,
    image_calls: AtomicUsize,
    gallery_calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn with_breeds(breeds: Vec<RemoteBreed>) -> Self {
        Self {
            breeds,
            failing: AtomicBool::new(false),
            listing_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            gallery_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_breed_keys(keys: &[&str]) -> Self {
        Self::with_breeds(keys.iter().map(|k| RemoteBreed::new(*k, vec![])).collect())
    }

    pub fn failing() -> Self {
        let fetcher = Self::with_breeds(Vec::new());
        fetcher.set_failing(true);
        fetcher
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

    pub fn gallery_calls(&self) -> usize {
        self.gallery_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), UpstreamError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status { status: 503 });
        }
        Ok(())
    }
}

fn image_url(key: &str, variant: Option<&str>, n: usize) -> String {
    format!(
        "https://images.test/{}/{}/{}.jpg",
        key,
        variant.unwrap_or("any"),
        n
    )
}

#[async_trait]
impl BreedFetcher for ScriptedFetcher {
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
        Ok(image_url(breed_key, variant, n))
    }

    async fn fetch_images(
        &self,
        breed_key: &str,
        variant: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, UpstreamError> {
        let call = self.gallery_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok((0..count)
            .map(|i| image_url(breed_key, variant, 1000 * (call + 1) + i))
            .collect())
    }

    async fn probe_image_size(&self, _url: &str) -> Option<u64> {
        Some(2048)
    }
}
