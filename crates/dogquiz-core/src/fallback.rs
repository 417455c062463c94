//! Built-in breed profiles
//!
//! Two uses:
//! - the last rung of the fallback chain when neither upstream nor the
//!   record store has anything to offer
//! - descriptive facts for fetched breeds, which upstream does not provide
//!
//! Profiles are keyed by record id (`{breed}` or `{breed}-{variant}`).

use crate::models::{BreedRecord, Difficulty, Size, SOURCE_BUILTIN};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Descriptive facts for one breed
#[derive(Debug, Clone)]
pub struct BreedProfile {
    pub breed_key: &'static str,
    pub variant: Option<&'static str>,
    pub name: &'static str,
    pub description: &'static str,
    pub trivia: &'static str,
    pub origin: &'static str,
    pub temperament: &'static [&'static str],
    pub life_span: &'static str,
    pub size: Size,
    pub difficulty: Difficulty,
}

impl BreedProfile {
    pub fn id(&self) -> String {
        BreedRecord::make_id(self.breed_key, self.variant)
    }

    /// Copy the descriptive fields onto a record, leaving timestamps alone
    pub fn apply_to(&self, record: &mut BreedRecord) {
        record.description = self.description.to_string();
        record.trivia = self.trivia.to_string();
        record.origin = self.origin.to_string();
        record.temperament = self.temperament.iter().map(|t| t.to_string()).collect();
        record.life_span = self.life_span.to_string();
    }

    /// Built-in record stamped at `now`
    pub fn to_record(&self, now: DateTime<Utc>, ttl: Duration) -> BreedRecord {
        let mut record = BreedRecord::new(
            self.breed_key,
            self.variant.map(str::to_string),
            self.name,
            now,
            ttl,
        );
        self.apply_to(&mut record);
        record.size = self.size;
        record.difficulty = self.difficulty;
        record.source = SOURCE_BUILTIN.to_string();
        record
    }
}

static PROFILES: &[BreedProfile] = &[
    BreedProfile {
        breed_key: "labrador",
        variant: None,
        name: "Labrador",
        description: "Friendly, outgoing retriever bred to fetch nets and fish for fishermen.",
        trivia: "Consistently one of the most registered breeds in the world.",
        origin: "Canada (Newfoundland)",
        temperament: &["Friendly", "Active", "Outgoing"],
        life_span: "10-12 years",
        size: Size::Large,
        difficulty: Difficulty::Easy,
    },
    BreedProfile {
        breed_key: "beagle",
        variant: None,
        name: "Beagle",
        description: "Compact scent hound with a keen nose and a cheerful bay.",
        trivia: "Beagles work at airports sniffing out contraband food.",
        origin: "England",
        temperament: &["Curious", "Merry", "Friendly"],
        life_span: "12-15 years",
        size: Size::Small,
        difficulty: Difficulty::Easy,
    },
    BreedProfile {
        breed_key: "pug",
        variant: None,
        name: "Pug",
        description: "Square, wrinkled toy breed known for its curled tail and big eyes.",
        trivia: "A group of pugs is called a grumble.",
        origin: "China",
        temperament: &["Charming", "Mischievous", "Loving"],
        life_span: "13-15 years",
        size: Size::Small,
        difficulty: Difficulty::Easy,
    },
    BreedProfile {
        breed_key: "husky",
        variant: None,
        name: "Husky",
        description: "Medium-sized sled dog with a thick double coat and striking eyes.",
        trivia: "Huskies relayed diphtheria serum to Nome, Alaska in 1925.",
        origin: "Siberia",
        temperament: &["Outgoing", "Mischievous", "Loyal"],
        life_span: "12-14 years",
        size: Size::Large,
        difficulty: Difficulty::Easy,
    },
    BreedProfile {
        breed_key: "germanshepherd",
        variant: None,
        name: "German Shepherd",
        description: "Versatile herding dog widely used in police and assistance work.",
        trivia: "The first guide dog in the United States was a German Shepherd.",
        origin: "Germany",
        temperament: &["Confident", "Courageous", "Smart"],
        life_span: "7-10 years",
        size: Size::Large,
        difficulty: Difficulty::Easy,
    },
    BreedProfile {
        breed_key: "retriever",
        variant: Some("golden"),
        name: "Golden Retriever",
        description: "Gentle gundog with a dense golden coat and a soft mouth.",
        trivia: "Goldens can carry a raw egg in their mouth without breaking it.",
        origin: "Scotland",
        temperament: &["Intelligent", "Friendly", "Devoted"],
        life_span: "10-12 years",
        size: Size::Large,
        difficulty: Difficulty::Medium,
    },
    BreedProfile {
        breed_key: "dalmatian",
        variant: None,
        name: "Dalmatian",
        description: "Athletic coach dog with a distinctive spotted coat.",
        trivia: "Dalmatian puppies are born completely white.",
        origin: "Croatia",
        temperament: &["Dignified", "Smart", "Outgoing"],
        life_span: "11-13 years",
        size: Size::Large,
        difficulty: Difficulty::Easy,
    },
    BreedProfile {
        breed_key: "basenji",
        variant: None,
        name: "Basenji",
        description: "Sleek hunting dog from central Africa that yodels instead of barking.",
        trivia: "Basenjis groom themselves much like cats.",
        origin: "Central Africa",
        temperament: &["Independent", "Smart", "Poised"],
        life_span: "13-14 years",
        size: Size::Small,
        difficulty: Difficulty::Hard,
    },
];

static PROFILE_INDEX: Lazy<HashMap<String, &'static BreedProfile>> =
    Lazy::new(|| PROFILES.iter().map(|p| (p.id(), p)).collect());

/// Profile for a record id, if one is built in
pub fn profile(id: &str) -> Option<&'static BreedProfile> {
    PROFILE_INDEX.get(id).copied()
}

pub fn profiles() -> &'static [BreedProfile] {
    PROFILES
}

/// The built-in dataset as records stamped at `now`
pub fn static_breeds(now: DateTime<Utc>, ttl: Duration) -> Vec<BreedRecord> {
    PROFILES.iter().map(|p| p.to_record(now, ttl)).collect()
}

/// Generic facts for breeds without a profile
pub fn apply_generic(record: &mut BreedRecord) {
    record.description = format!("The {} is one of the breeds listed by dog.ceo.", record.name);
    record.trivia = format!(
        "Look closely at the coat and ears to tell the {} apart.",
        record.name
    );
    record.origin = "Unknown".to_string();
    record.temperament = Vec::new();
    record.life_span = "Unknown".to_string();
}

/// Display name: variant first, each word title-cased (`Australian Shepherd`)
pub fn display_name(breed_key: &str, variant: Option<&str>) -> String {
    let words = variant.into_iter().chain(std::iter::once(breed_key));
    words.map(title_case).collect::<Vec<_>>().join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
