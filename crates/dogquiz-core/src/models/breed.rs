//! Breed records as stored in the cache, and the consumer-facing `Breed`

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical size category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
    Giant,
}

impl Size {
    pub const ALL: [Size; 4] = [Size::Small, Size::Medium, Size::Large, Size::Giant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
            Size::Giant => "giant",
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Size::Small),
            "medium" => Ok(Size::Medium),
            "large" => Ok(Size::Large),
            "giant" => Ok(Size::Giant),
            other => Err(format!("unknown size '{}'", other)),
        }
    }
}

/// Quiz difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Source tag for records written from the remote API
pub const SOURCE_DOG_API: &str = "dog.ceo";
/// Source tag for the built-in dataset
pub const SOURCE_BUILTIN: &str = "builtin";

/// One cached breed (or breed + sub-breed variant)
///
/// `id` never changes after creation. `is_favorite` is user state: refreshes
/// write around it, only an explicit favorite toggle changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedRecord {
    pub id: String,
    /// Upstream breed key (e.g. `retriever`)
    pub breed_key: String,
    /// Upstream sub-breed key (e.g. `golden`)
    pub variant: Option<String>,
    pub name: String,
    pub description: String,
    pub trivia: String,
    pub origin: String,
    pub size: Size,
    pub difficulty: Difficulty,
    pub temperament: Vec<String>,
    pub life_span: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub source: String,
    pub is_favorite: bool,
}

impl BreedRecord {
    /// Build the record id for a breed key and optional variant
    pub fn make_id(breed_key: &str, variant: Option<&str>) -> String {
        match variant {
            Some(v) => format!("{}-{}", breed_key, v),
            None => breed_key.to_string(),
        }
    }

    /// New record stamped at `now`, expiring `ttl` later
    pub fn new(
        breed_key: impl Into<String>,
        variant: Option<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let breed_key = breed_key.into();
        let now = truncate_millis(now);
        Self {
            id: Self::make_id(&breed_key, variant.as_deref()),
            breed_key,
            variant,
            name: name.into(),
            description: String::new(),
            trivia: String::new(),
            origin: String::new(),
            size: Size::Medium,
            difficulty: Difficulty::Medium,
            temperament: Vec::new(),
            life_span: String::new(),
            cached_at: now,
            expires_at: now + ttl,
            last_updated_at: now,
            source: SOURCE_DOG_API.to_string(),
            is_favorite: false,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        crate::freshness::is_valid(now, self.expires_at)
    }

    /// Rough persisted footprint, used for byte statistics
    pub fn approx_bytes(&self) -> u64 {
        (self.id.len()
            + self.breed_key.len()
            + self.variant.as_ref().map_or(0, |v| v.len())
            + self.name.len()
            + self.description.len()
            + self.trivia.len()
            + self.origin.len()
            + self.temperament.iter().map(|t| t.len() + 3).sum::<usize>()
            + self.life_span.len()
            + self.source.len()
            + 48) as u64
    }
}

/// Breed handed to consumers, image reference attached lazily
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breed {
    #[serde(flatten)]
    pub record: BreedRecord,
    /// Primary image URL, `None` until loaded or when unavailable
    pub image_url: Option<String>,
}

impl Breed {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn with_image(mut self, url: Option<String>) -> Self {
        self.image_url = url;
        self
    }
}

impl From<BreedRecord> for Breed {
    fn from(record: BreedRecord) -> Self {
        Self {
            record,
            image_url: None,
        }
    }
}

/// SQLite columns hold millisecond precision; keep in-memory values aligned
pub fn truncate_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id() {
        assert_eq!(BreedRecord::make_id("beagle", None), "beagle");
        assert_eq!(
            BreedRecord::make_id("retriever", Some("golden")),
            "retriever-golden"
        );
    }

    #[test]
    fn test_new_sets_expiry_from_ttl() {
        let now = Utc::now();
        let record = BreedRecord::new("beagle", None, "Beagle", now, Duration::days(7));
        assert_eq!(record.expires_at, record.cached_at + Duration::days(7));
        assert_eq!(record.last_updated_at, record.cached_at);
        assert!(!record.is_favorite);
        assert!(record.is_valid(now));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Giant".parse::<Size>().unwrap(), Size::Giant);
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("tiny".parse::<Size>().is_err());
    }

    #[test]
    fn test_breed_serializes_flat() {
        let record = BreedRecord::new("pug", None, "Pug", Utc::now(), Duration::days(7));
        let breed = Breed::from(record).with_image(Some("https://x/pug.jpg".into()));
        let json = serde_json::to_value(&breed).unwrap();
        assert_eq!(json["id"], "pug");
        assert_eq!(json["image_url"], "https://x/pug.jpg");
    }
}
