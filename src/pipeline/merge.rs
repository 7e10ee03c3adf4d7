//! Field-wise merge of a freshly generated draft into an existing recipe.
use chrono::Utc;

use crate::pipeline::draft::RecipeDraft;
use crate::pipeline::similarity::SimilarityEngine;
use crate::store::models::RecipeRecord;
use crate::util::text;

/// Merge `draft` into `existing`, preferring whichever side carries more
/// information per field. The merged record keeps the existing recipe's
/// identity: same id, same owner, same creation timestamp.
#[must_use]
pub fn merge(draft: &RecipeDraft, existing: &RecipeRecord) -> RecipeRecord {
    let mut merged = existing.clone();

    if draft.title.chars().count() > existing.title.chars().count() {
        merged.title = draft.title.clone();
    }

    merged.ingredients = merge_ingredients(&existing.ingredients, &draft.ingredients);

    // Steps move wholesale; mixing step lists would interleave two different
    // procedures.
    if draft.steps.len() > existing.steps.len() {
        merged.steps = draft.steps.clone();
    }

    if !existing.nutrition.is_complete() && draft.nutrition.is_complete() {
        merged.nutrition = draft.nutrition.clone();
    }

    merged.prep_time_minutes = merge_minutes(existing.prep_time_minutes, draft.prep_time_minutes);
    merged.cook_time_minutes = merge_minutes(existing.cook_time_minutes, draft.cook_time_minutes);
    merged.total_time_minutes =
        merge_minutes(existing.total_time_minutes, draft.total_time_minutes);

    if merged.category.is_none() {
        merged.category = draft.category.clone();
    }
    if merged.tags.is_empty() {
        merged.tags = draft.tags.clone();
    }
    if merged.thumbnail_url.is_none() {
        merged.thumbnail_url = draft.thumbnail_url.clone();
    }

    merged.quality_score = match (existing.quality_score, draft.quality_score) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    merged.similarity_hash = Some(SimilarityEngine::hash(&merged.as_draft()));
    merged.updated_at = Utc::now();
    merged
}

/// Union of both ingredient lists, deduplicated by normalized form. The
/// longer original phrasing wins; existing entries keep their position and
/// new entries are appended in order.
fn merge_ingredients(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + incoming.len());
    let mut seen: Vec<String> = Vec::with_capacity(existing.len() + incoming.len());

    for ingredient in existing.iter().chain(incoming.iter()) {
        let key = text::normalize_ingredient(ingredient);
        match seen.iter().position(|existing_key| *existing_key == key) {
            Some(index) => {
                if ingredient.chars().count() > merged[index].chars().count() {
                    merged[index] = ingredient.clone();
                }
            }
            None => {
                seen.push(key);
                merged.push(ingredient.clone());
            }
        }
    }

    merged
}

/// Mean of both durations rounded to the nearest minute; a single present
/// value passes through unchanged.
fn merge_minutes(existing: Option<u32>, incoming: Option<u32>) -> Option<u32> {
    match (existing, incoming) {
        (Some(a), Some(b)) => Some((a + b).div_ceil(2)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::draft::{NutritionFacts, StepDraft};
    use uuid::Uuid;

    fn base_record() -> RecipeRecord {
        RecipeRecord {
            id: Uuid::new_v4(),
            title: "Margherita Pizza".to_string(),
            servings: 2,
            ingredients: vec!["flour".to_string(), "tomato sauce".to_string()],
            steps: vec![StepDraft {
                text: "Make the dough".to_string(),
                illustration_prompt: String::new(),
                image_url: None,
            }],
            nutrition: NutritionFacts::default(),
            prep_time_minutes: Some(20),
            cook_time_minutes: None,
            total_time_minutes: None,
            category: None,
            tags: vec![],
            quality_score: Some(7.5),
            similarity_hash: None,
            thumbnail_url: None,
            owner_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn base_draft() -> RecipeDraft {
        RecipeDraft {
            id: Uuid::new_v4(),
            title: "Classic Margherita Pizza".to_string(),
            servings: 4,
            ingredients: vec![
                "2 cups flour".to_string(),
                "fresh basil".to_string(),
            ],
            steps: vec![
                StepDraft {
                    text: "Make the dough".to_string(),
                    illustration_prompt: String::new(),
                    image_url: None,
                },
                StepDraft {
                    text: "Bake until golden".to_string(),
                    illustration_prompt: String::new(),
                    image_url: None,
                },
            ],
            nutrition: NutritionFacts {
                calories: "250 kcal".to_string(),
                protein: "9 g".to_string(),
                fat: "8 g".to_string(),
                carbohydrates: "34 g".to_string(),
            },
            prep_time_minutes: Some(30),
            cook_time_minutes: Some(15),
            total_time_minutes: None,
            category: Some("pizza".to_string()),
            tags: vec!["vegetarian".to_string()],
            quality_score: Some(8.2),
            similarity_hash: None,
            thumbnail_url: None,
        }
    }

    #[test]
    fn longer_title_wins_and_identity_is_kept() {
        let existing = base_record();
        let merged = merge(&base_draft(), &existing);

        assert_eq!(merged.title, "Classic Margherita Pizza");
        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.servings, existing.servings);
        assert_eq!(merged.created_at, existing.created_at);
        assert!(merged.updated_at >= existing.updated_at);
    }

    #[test]
    fn equal_length_title_keeps_existing() {
        let mut existing = base_record();
        existing.title = "Pizza Margherita Classic".to_string();
        let merged = merge(&base_draft(), &existing);
        assert_eq!(merged.title, "Pizza Margherita Classic");
    }

    #[test]
    fn ingredients_union_dedups_by_normalized_form() {
        let merged = merge(&base_draft(), &base_record());

        // "flour" and "2 cups flour" normalize to the same key; the longer
        // phrasing survives in the existing slot.
        assert_eq!(
            merged.ingredients,
            vec!["2 cups flour", "tomato sauce", "fresh basil"]
        );
    }

    #[test]
    fn larger_step_list_moves_wholesale() {
        let merged = merge(&base_draft(), &base_record());
        assert_eq!(merged.steps.len(), 2);
        assert_eq!(merged.steps[1].text, "Bake until golden");
    }

    #[test]
    fn incomplete_existing_nutrition_adopts_new() {
        let merged = merge(&base_draft(), &base_record());
        assert_eq!(merged.nutrition.calories, "250 kcal");
    }

    #[test]
    fn complete_existing_nutrition_is_kept() {
        let mut existing = base_record();
        existing.nutrition = NutritionFacts {
            calories: "300 kcal".to_string(),
            protein: "12 g".to_string(),
            fat: "10 g".to_string(),
            carbohydrates: "40 g".to_string(),
        };
        let merged = merge(&base_draft(), &existing);
        assert_eq!(merged.nutrition.calories, "300 kcal");
    }

    #[test]
    fn both_nutrition_blocks_empty_keeps_existing_defaults() {
        let mut draft = base_draft();
        draft.nutrition = NutritionFacts::default();
        let merged = merge(&draft, &base_record());
        assert_eq!(merged.nutrition, NutritionFacts::default());
    }

    #[test]
    fn time_fields_average_when_both_present() {
        let merged = merge(&base_draft(), &base_record());
        assert_eq!(merged.prep_time_minutes, Some(25));
        assert_eq!(merged.cook_time_minutes, Some(15));
        assert_eq!(merged.total_time_minutes, None);
    }

    #[test]
    fn merge_is_deterministic() {
        let draft = base_draft();
        let existing = base_record();
        let first = merge(&draft, &existing);
        let second = merge(&draft, &existing);

        assert_eq!(first.title, second.title);
        assert_eq!(first.ingredients, second.ingredients);
        assert_eq!(first.similarity_hash, second.similarity_hash);
    }

    #[test]
    fn merged_hash_is_recomputed() {
        let merged = merge(&base_draft(), &base_record());
        assert!(merged.similarity_hash.is_some());
        assert_eq!(
            merged.similarity_hash,
            Some(SimilarityEngine::hash(&merged.as_draft()))
        );
    }
}
