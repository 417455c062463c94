//! Breed size and difficulty classification
//!
//! Upstream only gives breed keys, so size and quiz difficulty are derived
//! from the key itself. The repository takes any [`BreedClassifier`];
//! [`PatternClassifier`] is the default rule set.

use crate::models::{Difficulty, Size};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub size: Size,
    pub difficulty: Difficulty,
}

pub trait BreedClassifier: Send + Sync {
    fn classify(&self, breed_key: &str, variant: Option<&str>) -> Classification;
}

static COMMON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(beagle|boxer|bulldog|chihuahua|collie|corgi|dachshund|dalmatian|doberman|germanshepherd|husky|labrador|pomeranian|poodle|pug|retriever|rottweiler|shihtzu)$").unwrap()
});

static RARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(affenpinscher|basenji|borzoi|bouvier|briard|cotondetulear|entlebucher|kelpie|komondor|kuvasz|leonberg|lhasa|mexicanhairless|otterhound|ovcharka|pembroke|schipperke|sharpei|tervuren|vizsla|xolo)").unwrap()
});

static TOY_VARIANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(toy|miniature|medium|small|mini)$").unwrap());

static GIANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(mastiff|dane|newfoundland|stbernard|leonberg|pyrenees|wolfhound|komondor|kuvasz|ovcharka|deerhound)").unwrap()
});

static LARGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(retriever|shepherd|husky|malamute|rottweiler|doberman|boxer|labrador|setter|pointer|ridgeback|akita|weimaraner|bloodhound|borzoi|vizsla|briard|bouvier|afghan|dalmatian|chow)").unwrap()
});

static SMALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(chihuahua|pug|pomeranian|maltese|yorkshire|shihtzu|papillon|pekinese|affenpinscher|dachshund|corgi|spitz|bichon|havanese|schipperke|lhasa|cotondetulear|terrier|cairn|westhighland)").unwrap()
});

/// Regex rules over breed and variant keys
///
/// Difficulty:
/// - rare breeds are Hard
/// - well-known breeds are Easy, or Medium when a variant must be told apart
/// - any other variant is Hard, any other breed Medium
///
/// Size: toy/miniature variants first, then giant, large and small breed
/// patterns; Medium when nothing matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternClassifier;

impl PatternClassifier {
    fn size(&self, breed_key: &str, variant: Option<&str>) -> Size {
        if variant.is_some_and(|v| TOY_VARIANT.is_match(v)) {
            return Size::Small;
        }

        let matches = |re: &Regex| re.is_match(breed_key) || variant.is_some_and(|v| re.is_match(v));
        if matches(&GIANT) {
            Size::Giant
        } else if matches(&LARGE) {
            Size::Large
        } else if matches(&SMALL) {
            Size::Small
        } else {
            Size::Medium
        }
    }

    fn difficulty(&self, breed_key: &str, variant: Option<&str>) -> Difficulty {
        if RARE.is_match(breed_key) {
            return Difficulty::Hard;
        }
        match (COMMON.is_match(breed_key), variant.is_some()) {
            (true, false) => Difficulty::Easy,
            (true, true) => Difficulty::Medium,
            (false, true) => Difficulty::Hard,
            (false, false) => Difficulty::Medium,
        }
    }
}

impl BreedClassifier for PatternClassifier {
    fn classify(&self, breed_key: &str, variant: Option<&str>) -> Classification {
        Classification {
            size: self.size(breed_key, variant),
            difficulty: self.difficulty(breed_key, variant),
        }
    }
}
