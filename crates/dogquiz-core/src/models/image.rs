//! Cached image references

use super::breed::truncate_millis;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Primary,
    Quiz,
    Gallery,
    Thumbnail,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Primary => "primary",
            ImageType::Quiz => "quiz",
            ImageType::Gallery => "gallery",
            ImageType::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ImageType::Primary),
            "quiz" => Ok(ImageType::Quiz),
            "gallery" => Ok(ImageType::Gallery),
            "thumbnail" => Ok(ImageType::Thumbnail),
            other => Err(format!("unknown image type '{}'", other)),
        }
    }
}

/// One cached image for a breed
///
/// At most one row per `breed_id` carries `is_primary = true`; the store
/// enforces this inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub breed_id: String,
    pub url: String,
    pub image_type: ImageType,
    pub is_primary: bool,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Incremented on every cache read
    pub access_count: u64,
    /// 0 when unknown
    pub byte_size: u64,
    pub local_path: Option<PathBuf>,
}

impl ImageRecord {
    /// Stable id so caching the same image twice replaces one row
    pub fn derive_id(breed_id: &str, image_type: ImageType, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(breed_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(image_type.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        format!("{}_{}", breed_id, hex::encode(&digest[..8]))
    }

    pub fn new(
        breed_id: impl Into<String>,
        url: impl Into<String>,
        image_type: ImageType,
        byte_size: u64,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let breed_id = breed_id.into();
        let url = url.into();
        let now = truncate_millis(now);
        Self {
            id: Self::derive_id(&breed_id, image_type, &url),
            breed_id,
            url,
            image_type,
            is_primary: image_type == ImageType::Primary,
            cached_at: now,
            expires_at: now + ttl,
            last_accessed_at: now,
            access_count: 0,
            byte_size,
            local_path: None,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        crate::freshness::is_valid(now, self.expires_at)
    }
}
