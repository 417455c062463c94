//! dog.ceo API client
//!
//! Every endpoint answers with the same envelope:
//! `{"message": <payload>, "status": "success"}`. Error responses keep the
//! envelope with `"status": "error"` and a text message.

use super::{BreedFetcher, RemoteBreed};
use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Public dog.ceo API root
pub const DOG_API_BASE_URL: &str = "https://dog.ceo/api";

/// Upstream refuses batches larger than this
const MAX_IMAGES_PER_REQUEST: usize = 50;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: serde_json::Value,
}

pub struct DogApiFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl DogApiFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dogquiz/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Result<Self, UpstreamError> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn images_path(&self, breed_key: &str, variant: Option<&str>) -> String {
        match variant {
            Some(v) => format!("{}/breed/{}/{}/images/random", self.base_url, breed_key, v),
            None => format!("{}/breed/{}/images/random", self.base_url, breed_key),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        debug!(url, "GET dog.ceo");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_envelope(&body)
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, UpstreamError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| UpstreamError::Decode {
        message: e.to_string(),
    })?;

    if envelope.status != "success" {
        return Err(UpstreamError::Api {
            status: envelope.status,
        });
    }

    serde_json::from_value(envelope.message).map_err(|e| UpstreamError::Decode {
        message: e.to_string(),
    })
}

#[async_trait]
impl BreedFetcher for DogApiFetcher {
    async fn fetch_all_breeds(&self) -> Result<Vec<RemoteBreed>, UpstreamError> {
        let url = format!("{}/breeds/list/all", self.base_url);
        let listing: BTreeMap<String, Vec<String>> = self.get(&url).await?;

        debug!(count = listing.len(), "Fetched breed listing");
        Ok(listing
            .into_iter()
            .map(|(key, variants)| RemoteBreed { key, variants })
            .collect())
    }

    async fn fetch_image(
        &self,
        breed_key: &str,
        variant: Option<&str>,
    ) -> Result<String, UpstreamError> {
        let url = self.images_path(breed_key, variant);
        let image: String = self.get(&url).await?;
        if image.is_empty() {
            return Err(UpstreamError::Empty);
        }
        Ok(image)
    }

    async fn fetch_images(
        &self,
        breed_key: &str,
        variant: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, UpstreamError> {
        let count = count.clamp(1, MAX_IMAGES_PER_REQUEST);
        let url = format!("{}/{}", self.images_path(breed_key, variant), count);
        self.get(&url).await
    }

    async fn probe_image_size(&self, url: &str) -> Option<u64> {
        let response = match self.client.head(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(url, status = r.status().as_u16(), "Image HEAD rejected");
                return None;
            }
            Err(e) => {
                warn!(url, error = %e, "Image HEAD failed");
                return None;
            }
        };

        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    }
}
