//! Similarity scoring between recipes and the cheap pre-filter hash.
use std::collections::{BTreeSet, HashSet};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::pipeline::draft::RecipeDraft;
use crate::util::text;

const TITLE_WEIGHT: f64 = 0.3;
const INGREDIENT_WEIGHT: f64 = 0.5;
const STEP_WEIGHT: f64 = 0.2;

/// Outcome of scoring one draft against one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    pub is_duplicate: bool,
    pub combined_score: f64,
    pub existing_recipe_id: Option<Uuid>,
    pub title_score: f64,
    pub ingredient_score: f64,
    pub step_score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityEngine {
    duplicate_threshold: f64,
}

impl SimilarityEngine {
    #[must_use]
    pub fn new(duplicate_threshold: f64) -> Self {
        Self {
            duplicate_threshold,
        }
    }

    /// Pairwise similarity over title words, normalized ingredient tokens,
    /// and step keywords, combined as a weighted sum.
    #[must_use]
    pub fn score(&self, draft: &RecipeDraft, existing: &RecipeDraft) -> SimilarityResult {
        let title_score = jaccard(&text::word_set(&draft.title), &text::word_set(&existing.title));
        let ingredient_score = jaccard(
            &text::ingredient_token_set(&draft.ingredients),
            &text::ingredient_token_set(&existing.ingredients),
        );
        let step_score = jaccard(
            &text::step_keyword_set(&draft.step_texts()),
            &text::step_keyword_set(&existing.step_texts()),
        );

        let combined_score = TITLE_WEIGHT * title_score
            + INGREDIENT_WEIGHT * ingredient_score
            + STEP_WEIGHT * step_score;

        SimilarityResult {
            is_duplicate: combined_score >= self.duplicate_threshold,
            combined_score,
            existing_recipe_id: Some(existing.id),
            title_score,
            ingredient_score,
            step_score,
        }
    }

    /// Order-independent fingerprint over the normalized title, the sorted
    /// deduplicated ingredient tokens, and the serving count.
    ///
    /// Used as an O(1) candidate pre-filter, never as the sole duplicate
    /// signal.
    #[must_use]
    pub fn hash(draft: &RecipeDraft) -> String {
        let title = text::normalize(&draft.title);
        let tokens: BTreeSet<String> = text::ingredient_token_set(&draft.ingredients)
            .into_iter()
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"|");
        for token in &tokens {
            hasher.update(token.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b"|");
        hasher.update(draft.servings.to_string().as_bytes());

        let digest = hasher.finalize();
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// |intersection| / |union|, defined as 1 when both sets are empty.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}
