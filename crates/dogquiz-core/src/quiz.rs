//! Quiz set generation
//!
//! A question shows one breed's photo and four distinct breed names. Pools
//! are taken from the repository in up to three attempts:
//! 1. breeds of the requested difficulty
//! 2. every breed the repository serves
//! 3. every breed after a forced refresh
//!
//! Fewer than four distinct breeds after the last attempt is the one error
//! the retrieval layer reports to its caller.

use crate::error::{CoreError, Result};
use crate::models::{Breed, Difficulty};
use crate::repository::BreedRepository;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Answer options per question
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Pool attempts before giving up
pub const QUIZ_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct QuizQuestion {
    pub breed_id: String,
    /// Primary image of the correct breed, `None` when unavailable
    pub image_url: Option<String>,
    /// Breed names, exactly one of them correct
    pub options: Vec<String>,
    pub correct_index: usize,
    pub difficulty: Difficulty,
}

impl QuizQuestion {
    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn is_correct(&self, answer_index: usize) -> bool {
        answer_index == self.correct_index
    }
}

/// Question skeleton before the image is resolved
#[derive(Debug)]
struct PlannedQuestion {
    breed_id: String,
    options: Vec<String>,
    correct_index: usize,
    difficulty: Difficulty,
}

/// One entry per distinct display name
fn distinct_breeds(breeds: Vec<Breed>) -> Vec<Breed> {
    let mut seen = HashSet::new();
    breeds
        .into_iter()
        .filter(|b| seen.insert(b.record.name.to_lowercase()))
        .collect()
}

/// Plan `count` questions; correct answers cycle through the shuffled pool
fn plan_questions<R: Rng + ?Sized>(
    pool: &[Breed],
    count: usize,
    rng: &mut R,
) -> Vec<PlannedQuestion> {
    let mut order: Vec<&Breed> = pool.iter().collect();
    order.shuffle(rng);

    (0..count)
        .map(|i| {
            let correct = order[i % order.len()];
            let mut options: Vec<&str> = pool
                .iter()
                .filter(|b| b.id() != correct.id())
                .map(|b| b.name())
                .collect::<Vec<_>>()
                .choose_multiple(rng, OPTIONS_PER_QUESTION - 1)
                .copied()
                .collect();
            options.push(correct.name());
            options.shuffle(rng);

            let correct_index = options
                .iter()
                .position(|name| *name == correct.name())
                .unwrap_or(0);

            PlannedQuestion {
                breed_id: correct.id().to_string(),
                options: options.into_iter().map(str::to_string).collect(),
                correct_index,
                difficulty: correct.record.difficulty,
            }
        })
        .collect()
}

impl BreedRepository {
    /// Build `count` questions, preferring breeds of `difficulty`
    pub async fn generate_quiz_set(
        &self,
        difficulty: Option<Difficulty>,
        count: usize,
    ) -> Result<Vec<QuizQuestion>> {
        let mut found = 0;
        let mut pool = None;

        for attempt in 1..=QUIZ_ATTEMPTS {
            let mut breeds = self.get_all_breeds(attempt == QUIZ_ATTEMPTS).await;
            if attempt == 1 {
                if let Some(d) = difficulty {
                    breeds.retain(|b| b.record.difficulty == d);
                }
            }

            let distinct = distinct_breeds(breeds);
            debug!(attempt, distinct = distinct.len(), "Quiz pool assembled");
            found = found.max(distinct.len());
            if distinct.len() >= OPTIONS_PER_QUESTION {
                pool = Some(distinct);
                break;
            }
        }

        let Some(pool) = pool else {
            return Err(CoreError::InsufficientData {
                needed: OPTIONS_PER_QUESTION,
                found,
                attempts: QUIZ_ATTEMPTS,
            });
        };

        let planned = plan_questions(&pool, count, &mut rand::thread_rng());

        let mut questions = Vec::with_capacity(planned.len());
        for plan in planned {
            let image_url = self
                .load_image(&plan.breed_id)
                .await
                .and_then(|b| b.image_url);
            questions.push(QuizQuestion {
                breed_id: plan.breed_id,
                image_url,
                options: plan.options,
                correct_index: plan.correct_index,
                difficulty: plan.difficulty,
            });
        }
        Ok(questions)
    }
}
