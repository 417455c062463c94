//! Remote breed data sources
//!
//! The cache only needs three things from upstream: the breed listing, one
//! image URL for a breed, and a batch of image URLs for a gallery. Any
//! implementation of [`BreedFetcher`] can stand in for the dog.ceo client.

pub mod dog_api;

use crate::error::UpstreamError;
use async_trait::async_trait;

pub use dog_api::{DogApiFetcher, DOG_API_BASE_URL};

/// One entry of the upstream breed listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBreed {
    /// Upstream breed key (e.g. `retriever`)
    pub key: String,
    /// Sub-breed keys, possibly empty (e.g. `golden`, `flatcoated`)
    pub variants: Vec<String>,
}

impl RemoteBreed {
    pub fn new(key: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            key: key.into(),
            variants,
        }
    }
}

#[async_trait]
pub trait BreedFetcher: Send + Sync {
    /// Full breed listing, sorted by key
    async fn fetch_all_breeds(&self) -> Result<Vec<RemoteBreed>, UpstreamError>;

    /// One random image URL for a breed or variant
    async fn fetch_image(
        &self,
        breed_key: &str,
        variant: Option<&str>,
    ) -> Result<String, UpstreamError>;

    /// Up to `count` random image URLs for a breed or variant
    async fn fetch_images(
        &self,
        breed_key: &str,
        variant: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, UpstreamError>;

    /// Byte size of an image, `None` when the server does not say
    async fn probe_image_size(&self, _url: &str) -> Option<u64> {
        None
    }
}

/// Fetcher used when network access is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

#[async_trait]
impl BreedFetcher for OfflineFetcher {
    async fn fetch_all_breeds(&self) -> Result<Vec<RemoteBreed>, UpstreamError> {
        Err(UpstreamError::Offline)
    }

    async fn fetch_image(
        &self,
        _breed_key: &str,
        _variant: Option<&str>,
    ) -> Result<String, UpstreamError> {
        Err(UpstreamError::Offline)
    }

    async fn fetch_images(
        &self,
        _breed_key: &str,
        _variant: Option<&str>,
        _count: usize,
    ) -> Result<Vec<String>, UpstreamError> {
        Err(UpstreamError::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_fetcher_always_fails() {
        let fetcher = OfflineFetcher;
        assert!(matches!(
            fetcher.fetch_all_breeds().await,
            Err(UpstreamError::Offline)
        ));
        assert!(fetcher.fetch_image("pug", None).await.is_err());
        assert!(fetcher.fetch_images("pug", None, 3).await.is_err());
        assert_eq!(fetcher.probe_image_size("https://x/1.jpg").await, None);
    }
}
